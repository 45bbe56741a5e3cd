//! Projections computed from a transformed dataset.
//!
//! Each adapter is a pure function of its input dataset and returns an owned
//! result. None of them modify the dataset they are given.

mod kmeans;
mod pca;
mod pivot;

pub use kmeans::{ClusterAssignment, KMeans, cluster, cluster_with_seed};
pub use pca::{EmbeddingResult, PC1, PC2, embed};
pub use pivot::{Aggregation, PivotLayer, PivotTable, PivotWarning, pivot};

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::utils::first_non_finite;

/// Row-major matrix of `dataset`, rejecting NaN and infinite values.
pub(crate) fn finite_rows(dataset: &Dataset, what: &str) -> Result<Vec<Vec<f64>>> {
    let columns = dataset.column_vectors()?;
    if let Some(name) = first_non_finite(&columns) {
        return Err(PipelineError::Computation(format!(
            "{}: column '{}' contains non-finite values",
            what, name
        )));
    }
    dataset.rows()
}

//! Two-component principal component analysis.

use super::finite_rows;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Serialize;
use tracing::{debug, warn};

/// Name of the first embedding column.
pub const PC1: &str = "PC1";
/// Name of the second embedding column.
pub const PC2: &str = "PC2";

const COMPONENTS: usize = 2;

/// Rows projected onto the two leading principal axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    /// `PC1` and `PC2` columns, one row per input row, in input order.
    pub embedding: Dataset,
    /// Share of total variance carried by each component.
    pub explained_variance_ratio: [f64; COMPONENTS],
    /// Unit loading vector of each component over the input columns.
    pub loadings: [Vec<f64>; COMPONENTS],
    /// Input column names, in loading order.
    pub feature_names: Vec<String>,
}

impl EmbeddingResult {
    pub fn pc1(&self) -> Result<Vec<f64>> {
        self.embedding.values(PC1)
    }

    pub fn pc2(&self) -> Result<Vec<f64>> {
        self.embedding.values(PC2)
    }
}

/// Project `dataset` onto its two leading principal components.
///
/// Columns are centred and the sample covariance matrix is decomposed. Each
/// component's sign is chosen so that its largest-magnitude loading is
/// positive.
pub fn embed(dataset: &Dataset) -> Result<EmbeddingResult> {
    dataset.ensure_not_empty()?;
    if dataset.width() < COMPONENTS {
        return Err(PipelineError::insufficient(
            "PCA columns",
            COMPONENTS,
            dataset.width(),
        ));
    }
    if dataset.height() < 2 {
        return Err(PipelineError::insufficient("PCA rows", 2, dataset.height()));
    }

    let rows = finite_rows(dataset, "PCA")?;
    let (n, p) = dataset.shape();

    let means: Vec<f64> = (0..p)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();
    let centered = DMatrix::from_fn(n, p, |i, j| rows[i][j] - means[j]);
    let covariance = (centered.transpose() * &centered) / (n as f64 - 1.0);

    let eigen = SymmetricEigen::new(covariance);
    if eigen.eigenvalues.iter().any(|v| !v.is_finite())
        || eigen.eigenvectors.iter().any(|v| !v.is_finite())
    {
        return Err(PipelineError::Computation(
            "eigen-decomposition produced non-finite values".to_string(),
        ));
    }

    // nalgebra does not order eigenpairs
    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let total_variance: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if total_variance == 0.0 {
        warn!("All columns are constant, embedding collapses to the origin");
    }

    let mut loadings: [Vec<f64>; COMPONENTS] = [Vec::new(), Vec::new()];
    let mut ratios = [0.0; COMPONENTS];
    let mut scores: Vec<Vec<f64>> = Vec::with_capacity(COMPONENTS);

    for (component, &idx) in order.iter().take(COMPONENTS).enumerate() {
        let loading = orient(eigen.eigenvectors.column(idx).clone_owned());
        let projected = &centered * &loading;

        ratios[component] = if total_variance > 0.0 {
            eigen.eigenvalues[idx].max(0.0) / total_variance
        } else {
            0.0
        };
        loadings[component] = loading.iter().copied().collect();
        scores.push(projected.iter().copied().collect());
    }

    debug!(
        "PCA over {} rows x {} columns, explained variance {:?}",
        n, p, ratios
    );

    let mut scores = scores.into_iter();
    let embedding = Dataset::from_columns([
        (PC1, scores.next().unwrap_or_default()),
        (PC2, scores.next().unwrap_or_default()),
    ])?;

    Ok(EmbeddingResult {
        embedding,
        explained_variance_ratio: ratios,
        loadings,
        feature_names: dataset.column_names(),
    })
}

/// Flip `loading` so its largest-magnitude entry is positive.
fn orient(loading: DVector<f64>) -> DVector<f64> {
    let pivot = loading
        .iter()
        .copied()
        .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
    if pivot < 0.0 { -loading } else { loading }
}

//! Column distribution profiling.
//!
//! This module provides the summaries behind the dashboard's distribution
//! view:
//! - `describe`: count, mean, std and quartiles of one column
//! - `describe_many`: the same summary side by side for several files
//! - `histogram` / `joint_histogram`: equal-width 1D and 2D bin counts

mod statistics;

pub use statistics::{
    DEFAULT_BINS, HistogramBin, JointHistogram, MAX_BINS, MIN_BINS, histogram, joint_histogram,
};

use crate::dataset::Dataset;
use crate::error::{Result, ResultExt};
use crate::utils::{mean, quantile_sorted, sample_std, sorted_copy};
use serde::Serialize;
use tracing::debug;

/// Descriptive statistics of one column.
///
/// `std` is the sample standard deviation (`n - 1` denominator) and the
/// quartiles use linear interpolation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// Summaries of one column across several named datasets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryComparison {
    pub column: String,
    /// `(dataset name, summary)` in input order.
    pub summaries: Vec<(String, ColumnSummary)>,
    /// Datasets that lack the column.
    pub missing: Vec<String>,
}

/// Summarise `column` of `dataset`.
pub fn describe(dataset: &Dataset, column: &str) -> Result<ColumnSummary> {
    dataset.ensure_not_empty()?;
    let values = dataset.values(column)?;
    let sorted = sorted_copy(&values);
    let m = mean(&values);

    Ok(ColumnSummary {
        column: column.to_string(),
        count: values.len(),
        mean: m,
        std: sample_std(&values, m),
        min: quantile_sorted(&sorted, 0.0),
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: quantile_sorted(&sorted, 1.0),
    })
}

/// Summarise `column` in each dataset that has it.
pub fn describe_many(datasets: &[(&str, &Dataset)], column: &str) -> Result<SummaryComparison> {
    let mut summaries = Vec::new();
    let mut missing = Vec::new();

    for (name, dataset) in datasets {
        if !dataset.has_column(column) {
            debug!("Dataset '{}' has no column '{}'", name, column);
            missing.push(name.to_string());
            continue;
        }
        let summary = describe(dataset, column)
            .context(format!("describing '{}' in '{}'", column, name))?;
        summaries.push((name.to_string(), summary));
    }

    Ok(SummaryComparison {
        column: column.to_string(),
        summaries,
        missing,
    })
}

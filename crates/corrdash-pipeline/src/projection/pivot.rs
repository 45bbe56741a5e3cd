//! Two-key mean aggregation for heat maps.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Largest number of stored cells (`x keys * y keys * (value columns + 1)`)
/// a pivot may allocate. Continuous key columns exceed it quickly.
pub const MAX_PIVOT_CELLS: usize = 2_000_000;

/// Cell aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
}

/// Non-fatal conditions attached to a pivot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotWarning {
    /// Both axes use the same column, only the diagonal is populated.
    DegenerateAxes,
    /// Every column is an axis, so there is nothing to aggregate.
    NoValueColumns,
}

/// Aggregated cells of one value column, indexed `[x][y]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotLayer {
    pub column: String,
    pub cells: Vec<Vec<f64>>,
}

/// Mean of every non-axis column per distinct `(x, y)` key pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub x_column: String,
    pub y_column: String,
    /// Distinct x values, ascending.
    pub x_keys: Vec<f64>,
    /// Distinct y values, ascending.
    pub y_keys: Vec<f64>,
    pub aggregation: Aggregation,
    pub layers: Vec<PivotLayer>,
    /// Rows per cell, indexed `[x][y]`. Cells with count 0 hold `0.0`.
    pub counts: Vec<Vec<usize>>,
    pub warnings: Vec<PivotWarning>,
}

impl PivotTable {
    /// Aggregated value of `column` at key pair `(x, y)`.
    pub fn value(&self, column: &str, x: f64, y: f64) -> Option<f64> {
        let (i, j) = self.cell_index(x, y)?;
        let layer = self.layers.iter().find(|layer| layer.column == column)?;
        Some(layer.cells[i][j])
    }

    /// Row count at key pair `(x, y)`.
    pub fn count(&self, x: f64, y: f64) -> Option<usize> {
        let (i, j) = self.cell_index(x, y)?;
        Some(self.counts[i][j])
    }

    pub fn has_warning(&self, warning: PivotWarning) -> bool {
        self.warnings.contains(&warning)
    }

    fn cell_index(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let i = key_position(&self.x_keys, x)?;
        let j = key_position(&self.y_keys, y)?;
        Some((i, j))
    }
}

/// Group rows by `(col_x, col_y)` and average every other column per cell.
///
/// Key pairs that never occur are filled with `0.0` and have count 0.
pub fn pivot(dataset: &Dataset, col_x: &str, col_y: &str) -> Result<PivotTable> {
    dataset.ensure_not_empty()?;
    let xs: Vec<f64> = dataset.values(col_x)?.into_iter().map(normalize).collect();
    let ys: Vec<f64> = dataset.values(col_y)?.into_iter().map(normalize).collect();

    let mut warnings = Vec::new();
    if col_x == col_y {
        warn!("Pivot axes are both '{}', table is diagonal", col_x);
        warnings.push(PivotWarning::DegenerateAxes);
    }

    let value_columns: Vec<(String, Vec<f64>)> = dataset
        .column_vectors()?
        .into_iter()
        .filter(|(name, _)| name != col_x && name != col_y)
        .collect();
    if value_columns.is_empty() {
        warn!("Pivot on '{}' x '{}' has no value columns", col_x, col_y);
        warnings.push(PivotWarning::NoValueColumns);
    }

    let x_keys = distinct_sorted(&xs);
    let y_keys = distinct_sorted(&ys);
    let cells = x_keys
        .len()
        .saturating_mul(y_keys.len())
        .saturating_mul(value_columns.len() + 1);
    if cells > MAX_PIVOT_CELLS {
        return Err(PipelineError::Configuration(format!(
            "pivot on '{}' x '{}' needs {} x {} cells over {} layers, above the limit of {}; \
             choose discrete key columns",
            col_x,
            col_y,
            x_keys.len(),
            y_keys.len(),
            value_columns.len() + 1,
            MAX_PIVOT_CELLS
        )));
    }
    let mut counts = vec![vec![0usize; y_keys.len()]; x_keys.len()];
    let mut sums = vec![vec![vec![0.0; y_keys.len()]; x_keys.len()]; value_columns.len()];

    for (row, (x, y)) in xs.iter().zip(&ys).enumerate() {
        let (Some(i), Some(j)) = (key_position(&x_keys, *x), key_position(&y_keys, *y)) else {
            continue;
        };
        counts[i][j] += 1;
        for (layer, (_, values)) in sums.iter_mut().zip(&value_columns) {
            layer[i][j] += values[row];
        }
    }

    let layers = value_columns
        .into_iter()
        .zip(sums)
        .map(|((column, _), layer_sums)| {
            let cells = layer_sums
                .into_iter()
                .zip(&counts)
                .map(|(row_sums, row_counts)| {
                    row_sums
                        .into_iter()
                        .zip(row_counts)
                        .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
                        .collect()
                })
                .collect();
            PivotLayer { column, cells }
        })
        .collect::<Vec<_>>();

    debug!(
        "Pivot '{}' x '{}': {} x {} cells, {} layers",
        col_x,
        col_y,
        x_keys.len(),
        y_keys.len(),
        layers.len()
    );

    Ok(PivotTable {
        x_column: col_x.to_string(),
        y_column: col_y.to_string(),
        x_keys,
        y_keys,
        aggregation: Aggregation::Mean,
        layers,
        counts,
        warnings,
    })
}

/// Fold `-0.0` into `0.0` so keys follow `==` rather than bit patterns.
fn normalize(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn distinct_sorted(values: &[f64]) -> Vec<f64> {
    let mut keys = values.to_vec();
    keys.sort_by(f64::total_cmp);
    keys.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    keys
}

fn key_position(keys: &[f64], value: f64) -> Option<usize> {
    keys.binary_search_by(|key| key.total_cmp(&normalize(value)))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Dataset {
        Dataset::from_columns([
            ("x", vec![1.0, 1.0, 2.0]),
            ("y", vec![1.0, 2.0, 1.0]),
            ("v", vec![10.0, 20.0, 30.0]),
        ])
        .unwrap()
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    #[test]
    fn test_basic_pivot() {
        let table = pivot(&sample(), "x", "y").unwrap();
        assert_eq!(table.x_keys, vec![1.0, 2.0]);
        assert_eq!(table.y_keys, vec![1.0, 2.0]);
        assert_eq!(table.value("v", 1.0, 1.0), Some(10.0));
        assert_eq!(table.value("v", 1.0, 2.0), Some(20.0));
        assert_eq!(table.value("v", 2.0, 1.0), Some(30.0));
        assert_eq!(table.value("v", 2.0, 2.0), Some(0.0));
        assert_eq!(table.count(2.0, 2.0), Some(0));
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_mean_of_repeated_keys() {
        let dataset = Dataset::from_columns([
            ("x", vec![1.0, 1.0, 1.0]),
            ("y", vec![0.0, 0.0, 0.0]),
            ("v", vec![1.0, 2.0, 6.0]),
            ("w", vec![-1.0, -1.0, -4.0]),
        ])
        .unwrap();
        let table = pivot(&dataset, "x", "y").unwrap();
        assert_eq!(table.count(1.0, 0.0), Some(3));
        assert_eq!(table.value("v", 1.0, 0.0), Some(3.0));
        assert_eq!(table.value("w", 1.0, 0.0), Some(-2.0));
        assert_eq!(table.layers.len(), 2);
    }

    #[test]
    fn test_keys_sorted_numerically() {
        let dataset = Dataset::from_columns([
            ("x", vec![10.0, -2.0, 3.5, -2.0]),
            ("y", vec![0.0, -0.0, 1.0, 0.0]),
            ("v", vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let table = pivot(&dataset, "x", "y").unwrap();
        assert_eq!(table.x_keys, vec![-2.0, 3.5, 10.0]);
        assert_eq!(table.y_keys, vec![0.0, 1.0]);
        assert_eq!(table.value("v", -2.0, 0.0), Some(3.0));
    }

    #[test]
    fn test_same_axis_is_diagonal() {
        let table = pivot(&sample(), "x", "x").unwrap();
        assert!(table.has_warning(PivotWarning::DegenerateAxes));
        assert_eq!(table.count(1.0, 2.0), Some(0));
        assert_eq!(table.count(1.0, 1.0), Some(2));
        assert_eq!(table.value("v", 1.0, 1.0), Some(15.0));
        assert_eq!(table.layers.len(), 2);
    }

    #[test]
    fn test_no_value_columns() {
        let dataset =
            Dataset::from_columns([("x", vec![1.0, 2.0]), ("y", vec![3.0, 3.0])]).unwrap();
        let table = pivot(&dataset, "x", "y").unwrap();
        assert!(table.has_warning(PivotWarning::NoValueColumns));
        assert!(table.layers.is_empty());
        assert_eq!(table.counts, vec![vec![1], vec![1]]);
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_unknown_column() {
        assert!(matches!(
            pivot(&sample(), "x", "missing"),
            Err(PipelineError::ColumnNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_continuous_keys_exceed_cell_limit() {
        let n = 1500;
        let xs: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let ys: Vec<f64> = (0..n).map(|i| i as f64 * -0.02).collect();
        let vs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let dataset = Dataset::from_columns([("speed", xs), ("accel", ys), ("v", vs)]).unwrap();

        let err = pivot(&dataset, "speed", "accel").unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        let message = err.to_string();
        assert!(message.contains("1500 x 1500"));
        assert!(message.contains("discrete"));
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = Dataset::from_columns([("x", Vec::<f64>::new())]).unwrap();
        assert!(matches!(
            pivot(&dataset, "x", "x"),
            Err(PipelineError::EmptyDataset)
        ));
    }
}

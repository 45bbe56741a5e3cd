//! Equal-width histograms.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use serde::Serialize;

/// Fewest bins the distribution view offers.
pub const MIN_BINS: usize = 10;
/// Most bins the distribution view offers.
pub const MAX_BINS: usize = 100;
/// Bins used when the caller does not choose.
pub const DEFAULT_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// 2D bin counts, indexed `[x][y]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointHistogram {
    pub x_column: String,
    pub y_column: String,
    /// Bin boundaries along x; one more than the number of x bins.
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Vec<Vec<usize>>,
}

impl JointHistogram {
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

fn check_bins(bins: usize) -> Result<()> {
    if !(MIN_BINS..=MAX_BINS).contains(&bins) {
        return Err(PipelineError::Configuration(format!(
            "bin count {} must be between {} and {}",
            bins, MIN_BINS, MAX_BINS
        )));
    }
    Ok(())
}

/// Range of the finite values, if any.
fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Equal-width binning of one axis. Constant data gets a single bin.
struct Axis {
    min: f64,
    width: f64,
    bins: usize,
}

impl Axis {
    fn new(min: f64, max: f64, bins: usize) -> Self {
        if (max - min).abs() < f64::EPSILON {
            return Self {
                min,
                width: 0.0,
                bins: 1,
            };
        }
        Self {
            min,
            width: (max - min) / bins as f64,
            bins,
        }
    }

    fn index(&self, value: f64) -> usize {
        if self.width == 0.0 {
            return 0;
        }
        (((value - self.min) / self.width) as usize).min(self.bins - 1)
    }

    fn edges(&self) -> Vec<f64> {
        (0..=self.bins)
            .map(|i| self.min + i as f64 * self.width)
            .collect()
    }
}

/// Equal-width histogram over `[min, max]` of the finite values.
///
/// Empty input yields no bins; constant input yields one bin holding every
/// value.
pub fn histogram(values: &[f64], bins: usize) -> Result<Vec<HistogramBin>> {
    check_bins(bins)?;
    let Some((min, max)) = finite_range(values) else {
        return Ok(Vec::new());
    };

    let axis = Axis::new(min, max, bins);
    let mut counts = vec![0usize; axis.bins];
    for value in values.iter().filter(|v| v.is_finite()) {
        counts[axis.index(*value)] += 1;
    }

    let edges = axis.edges();
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: edges[idx],
            end: edges[idx + 1],
            count,
        })
        .collect())
}

/// 2D density of `col_x` against `col_y`.
pub fn joint_histogram(
    dataset: &Dataset,
    col_x: &str,
    col_y: &str,
    bins: usize,
) -> Result<JointHistogram> {
    check_bins(bins)?;
    dataset.ensure_not_empty()?;
    let xs = dataset.values(col_x)?;
    let ys = dataset.values(col_y)?;

    let pairs: Vec<(f64, f64)> = xs
        .into_iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let x_values: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
    let y_values: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();

    let (Some((x_min, x_max)), Some((y_min, y_max))) =
        (finite_range(&x_values), finite_range(&y_values))
    else {
        return Err(PipelineError::Computation(format!(
            "no finite value pairs in '{}' and '{}'",
            col_x, col_y
        )));
    };

    let x_axis = Axis::new(x_min, x_max, bins);
    let y_axis = Axis::new(y_min, y_max, bins);
    let mut counts = vec![vec![0usize; y_axis.bins]; x_axis.bins];
    for (x, y) in pairs {
        counts[x_axis.index(x)][y_axis.index(y)] += 1;
    }

    Ok(JointHistogram {
        x_column: col_x.to_string(),
        y_column: col_y.to_string(),
        x_edges: x_axis.edges(),
        y_edges: y_axis.edges(),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // histogram
    // ========================================================================

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let bins = histogram(&values, 10).unwrap();
        assert_eq!(bins.len(), 10);
        assert!(bins.iter().all(|bin| bin.count == 10));
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[9].end, 99.0);
    }

    #[test]
    fn test_histogram_max_lands_in_last_bin() {
        let bins = histogram(&[0.0, 10.0], 10).unwrap();
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 1);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = histogram(&[3.0; 6], 50).unwrap();
        assert_eq!(
            bins,
            vec![HistogramBin {
                start: 3.0,
                end: 3.0,
                count: 6
            }]
        );
    }

    #[test]
    fn test_histogram_skips_non_finite() {
        let bins = histogram(&[1.0, f64::NAN, 2.0, f64::INFINITY], 10).unwrap();
        assert_eq!(bins.iter().map(|bin| bin.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_histogram_empty_and_bin_bounds() {
        assert!(histogram(&[], 50).unwrap().is_empty());
        assert!(matches!(
            histogram(&[1.0], 9),
            Err(PipelineError::Configuration(_))
        ));
        assert!(histogram(&[1.0], 101).is_err());
    }

    // ========================================================================
    // joint_histogram
    // ========================================================================

    #[test]
    fn test_joint_histogram() {
        let dataset = Dataset::from_columns([
            ("speed", vec![0.0, 0.0, 10.0, 10.0, 5.0]),
            ("wheel_angle", vec![-1.0, 1.0, -1.0, 1.0, 1.0]),
        ])
        .unwrap();
        let joint = joint_histogram(&dataset, "speed", "wheel_angle", 10).unwrap();

        assert_eq!(joint.total(), 5);
        assert_eq!(joint.x_edges.len(), 11);
        assert_eq!(joint.counts[0][0], 1);
        assert_eq!(joint.counts[0][9], 1);
        assert_eq!(joint.counts[9][9], 1);
        assert_eq!(joint.counts[5][9], 1);
    }

    #[test]
    fn test_joint_histogram_constant_axis() {
        let dataset =
            Dataset::from_columns([("x", vec![1.0, 2.0, 3.0]), ("y", vec![4.0; 3])]).unwrap();
        let joint = joint_histogram(&dataset, "x", "y", 10).unwrap();
        assert_eq!(joint.y_edges, vec![4.0, 4.0]);
        assert!(joint.counts.iter().all(|row| row.len() == 1));
        assert_eq!(joint.total(), 3);
    }

    #[test]
    fn test_joint_histogram_unknown_column() {
        let dataset = Dataset::from_columns([("x", vec![1.0])]).unwrap();
        assert!(matches!(
            joint_histogram(&dataset, "x", "y", 10),
            Err(PipelineError::ColumnNotFound(_))
        ));
    }
}

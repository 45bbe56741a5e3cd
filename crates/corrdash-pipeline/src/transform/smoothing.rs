//! Trailing moving average.

use crate::config::{MAX_SMOOTHING_WINDOW, MIN_SMOOTHING_WINDOW};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::utils::mean;
use tracing::warn;

/// Trailing rolling mean over `window` rows.
///
/// `out[i]` is the mean of `in[i - window + 1 ..= i]`. The first
/// `window - 1` rows have no full window and take the value of the first
/// complete one. When the window is longer than the column, every row gets
/// the mean of the whole column.
pub struct RollingMean {
    window: usize,
}

impl RollingMean {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.clamp(MIN_SMOOTHING_WINDOW, MAX_SMOOTHING_WINDOW),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        if self.window > dataset.height() {
            warn!(
                "Smoothing window {} exceeds {} rows, using whole-column means",
                self.window,
                dataset.height()
            );
        }
        dataset.map_columns(|_, values| self.smooth(values))
    }

    fn smooth(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if self.window > n {
            return vec![mean(values); n];
        }

        let first_full = self.window - 1;
        let mut out: Vec<f64> = (0..n)
            .map(|i| {
                if i < first_full {
                    0.0
                } else {
                    mean(&values[i + 1 - self.window..=i])
                }
            })
            .collect();

        let fill = out[first_full];
        out[..first_full].fill(fill);
        out
    }
}

//! First-difference operator.

use crate::dataset::Dataset;
use crate::error::Result;

/// Discrete first derivative: `out[i] = in[i] - in[i - 1]`.
///
/// Rows without history are filled with `0`. A dataset that already carries
/// `f` zero-filled leading rows (from an earlier differencing) yields `f + 1`
/// zero rows.
pub struct Differentiator;

impl Differentiator {
    pub fn apply(dataset: &Dataset) -> Result<Dataset> {
        let fill_rows = dataset.leading_fill_rows() + 1;
        let out = dataset.map_columns(|_, values| Self::difference(values, fill_rows))?;
        Ok(out.with_leading_fill_rows(fill_rows))
    }

    fn difference(values: &[f64], fill_rows: usize) -> Vec<f64> {
        (0..values.len())
            .map(|i| {
                if i < fill_rows {
                    0.0
                } else {
                    values[i] - values[i - 1]
                }
            })
            .collect()
    }
}

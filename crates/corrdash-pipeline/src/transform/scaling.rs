//! Z-score standardisation.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::utils::{mean, population_std};
use tracing::debug;

/// Per-column `(x - mean) / std` using the population standard deviation.
///
/// Constant columns map to all zeros.
pub struct StandardScaler;

impl StandardScaler {
    pub fn apply(dataset: &Dataset) -> Result<Dataset> {
        dataset.map_columns(|name, values| {
            let (m, std) = Self::moments(values);
            if Self::is_constant(m, std) {
                debug!("Column '{}' has zero variance, scaling to zeros", name);
                return vec![0.0; values.len()];
            }
            values.iter().map(|v| (v - m) / std).collect()
        })
    }

    fn moments(values: &[f64]) -> (f64, f64) {
        let m = mean(values);
        (m, population_std(values, m))
    }

    /// Zero-variance test, relative to the column's magnitude with no
    /// absolute floor.
    fn is_constant(mean: f64, std: f64) -> bool {
        std <= 10.0 * f64::EPSILON * mean.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_zero_std_one() {
        let dataset = Dataset::from_columns([("x", vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])])
            .unwrap();
        let values = StandardScaler::apply(&dataset).unwrap().values("x").unwrap();

        let m = mean(&values);
        assert!(m.abs() < 1e-12);
        assert!((population_std(&values, m) - 1.0).abs() < 1e-12);
        assert!((values[0] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zeros() {
        let dataset = Dataset::from_columns([
            ("flat", vec![3.3; 4]),
            ("x", vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let out = StandardScaler::apply(&dataset).unwrap();
        assert_eq!(out.values("flat").unwrap(), vec![0.0; 4]);
        assert!(out.values("x").unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_large_constant_column_maps_to_zeros() {
        // Rounding in the mean leaves a tiny non-zero std for large constants.
        let dataset = Dataset::from_columns([("big", vec![1e15 + 0.1; 7])]).unwrap();
        let out = StandardScaler::apply(&dataset).unwrap();
        assert_eq!(out.values("big").unwrap(), vec![0.0; 7]);
    }

    #[test]
    fn test_tiny_magnitude_column_is_scaled() {
        let dataset = Dataset::from_columns([("tiny", vec![1e-16, 2e-16, 3e-16, 4e-16])]).unwrap();
        let values = StandardScaler::apply(&dataset)
            .unwrap()
            .values("tiny")
            .unwrap();

        let m = mean(&values);
        assert!(m.abs() < 1e-9);
        assert!((population_std(&values, m) - 1.0).abs() < 1e-9);
        assert!(values[0] < 0.0 && values[3] > 0.0);
    }

    #[test]
    fn test_all_zero_column_maps_to_zeros() {
        let dataset = Dataset::from_columns([("zero", vec![0.0; 5])]).unwrap();
        let out = StandardScaler::apply(&dataset).unwrap();
        assert_eq!(out.values("zero").unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn test_preserves_fill_rows() {
        let dataset = Dataset::from_columns([("x", vec![0.0, 1.0, 3.0])])
            .unwrap()
            .with_leading_fill_rows(1);
        let out = StandardScaler::apply(&dataset).unwrap();
        assert_eq!(out.leading_fill_rows(), 1);
    }
}

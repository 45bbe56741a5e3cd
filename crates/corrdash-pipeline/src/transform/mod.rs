//! Signal preprocessing operators.
//!
//! Every operator maps a whole [`Dataset`] to a new one of the same shape and
//! column order:
//! - [`Differentiator`]: first difference with zero-filled history rows
//! - [`StandardScaler`]: per-column z-score
//! - [`RollingMean`]: trailing moving average

mod derivative;
mod scaling;
mod smoothing;

pub use derivative::Differentiator;
pub use scaling::StandardScaler;
pub use smoothing::RollingMean;

use crate::config::TransformConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use tracing::debug;

/// Apply the selected operator to every column of `dataset`.
///
/// The configuration is validated before anything else, then the dataset is
/// checked for emptiness (for every variant, including `None`).
pub fn apply(dataset: &Dataset, config: &TransformConfig) -> Result<Dataset> {
    config.validate()?;
    dataset.ensure_not_empty()?;

    debug!(
        "Applying transform '{}' to {} rows x {} columns",
        config.label(),
        dataset.height(),
        dataset.width()
    );

    match config {
        TransformConfig::None => Ok(dataset.clone()),
        TransformConfig::Derivative => Differentiator::apply(dataset),
        TransformConfig::Scaling => StandardScaler::apply(dataset),
        TransformConfig::Smoothing { window } => RollingMean::new(*window).apply(dataset),
    }
}

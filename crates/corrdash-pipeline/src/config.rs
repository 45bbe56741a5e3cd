//! Configuration types for the signal pipeline.
//!
//! [`TransformConfig`] selects the preprocessing operator applied to the whole
//! table. [`PipelineOptions`] selects which projections run afterwards and is
//! built with a fluent builder, validated on `build()`.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted smoothing window.
pub const MIN_SMOOTHING_WINDOW: usize = 1;
/// Largest accepted smoothing window.
pub const MAX_SMOOTHING_WINDOW: usize = 10;
/// Smallest accepted cluster count.
pub const MIN_CLUSTERS: usize = 2;
/// Largest accepted cluster count.
pub const MAX_CLUSTERS: usize = 10;
/// Seed used by k-means unless the caller picks another one.
pub const DEFAULT_SEED: u64 = 42;
/// Lloyd iteration cap used by k-means unless overridden.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Preprocessing operator applied to every column of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Identity.
    #[default]
    None,
    /// First difference, leading row filled with 0.
    Derivative,
    /// Per-column z-score with population standard deviation.
    Scaling,
    /// Trailing rolling mean with back-filled boundary rows.
    Smoothing { window: usize },
}

impl TransformConfig {
    /// Check operator parameters.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Self::Smoothing { window } = self
            && !(MIN_SMOOTHING_WINDOW..=MAX_SMOOTHING_WINDOW).contains(window)
        {
            return Err(ConfigValidationError::InvalidSmoothingWindow(*window));
        }
        Ok(())
    }

    /// Parse a JSON selector such as `{"kind": "smoothing", "window": 5}`.
    ///
    /// Unknown tags, negative windows and malformed documents are all
    /// configuration errors.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("invalid transform: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Human-readable label used on plot axes.
    pub fn label(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Derivative => "Derivative".to_string(),
            Self::Scaling => "Z-Score".to_string(),
            Self::Smoothing { window } => format!("Smoothing (Window: {})", window),
        }
    }
}

impl fmt::Display for TransformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Accepts `none`, `derivative`, `scaling` (or `z-score`) and `smoothing:<window>`.
impl FromStr for TransformConfig {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let config = match normalized.split_once(':') {
            Some(("smoothing", window)) => {
                let window: usize = window.trim().parse().map_err(|_| {
                    PipelineError::Configuration(format!(
                        "invalid smoothing window '{}'",
                        window.trim()
                    ))
                })?;
                Self::Smoothing { window }
            }
            Some(_) => {
                return Err(PipelineError::Configuration(format!(
                    "unknown transform '{}'",
                    s
                )));
            }
            None => match normalized.as_str() {
                "none" | "identity" => Self::None,
                "derivative" => Self::Derivative,
                "scaling" | "z-score" | "zscore" => Self::Scaling,
                "smoothing" => {
                    return Err(PipelineError::Configuration(
                        "smoothing requires a window, e.g. 'smoothing:5'".to_string(),
                    ));
                }
                _ => {
                    return Err(PipelineError::Configuration(format!(
                        "unknown transform '{}'",
                        s
                    )));
                }
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Which projections to compute after the transform.
///
/// Use [`PipelineOptions::builder()`] to create one with the fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use corrdash_pipeline::PipelineOptions;
///
/// let options = PipelineOptions::builder()
///     .embed(true)
///     .cluster_k(3)
///     .pivot_columns("gear", "lane")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Compute the 2-component PCA embedding.
    /// Default: false
    pub embed: bool,

    /// Number of k-means clusters, if clustering is requested.
    /// Default: None
    pub cluster_k: Option<usize>,

    /// `(x, y)` columns for the pivot heat map, if requested.
    /// Default: None
    pub pivot_columns: Option<(String, String)>,

    /// Seed for k-means initialisation.
    /// Default: 42
    pub seed: u64,

    /// Lloyd iteration cap for k-means.
    /// Default: 300
    pub max_iterations: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            embed: false,
            cluster_k: None,
            pivot_columns: None,
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl PipelineOptions {
    /// Create a new options builder.
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    /// Validate the options and return errors if invalid.
    ///
    /// The cluster count is checked by the clustering adapter, so an
    /// out-of-range `k` only fails the clustering slot.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_iterations == 0 {
            return Err(ConfigValidationError::InvalidMaxIterations(
                self.max_iterations,
            ));
        }
        Ok(())
    }

    /// Whether any projection was requested.
    pub fn any_projection(&self) -> bool {
        self.embed || self.cluster_k.is_some() || self.pivot_columns.is_some()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error(
        "Invalid smoothing window: {0} (must be between {MIN_SMOOTHING_WINDOW} and {MAX_SMOOTHING_WINDOW})"
    )]
    InvalidSmoothingWindow(usize),

    #[error("Invalid cluster count: {0} (must be between {MIN_CLUSTERS} and {MAX_CLUSTERS})")]
    InvalidClusterCount(usize),

    #[error("Invalid max iterations: {0} (must be at least 1)")]
    InvalidMaxIterations(usize),
}

impl From<ConfigValidationError> for PipelineError {
    fn from(error: ConfigValidationError) -> Self {
        PipelineError::Configuration(error.to_string())
    }
}

/// Builder for [`PipelineOptions`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineOptionsBuilder {
    embed: Option<bool>,
    cluster_k: Option<usize>,
    pivot_columns: Option<(String, String)>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
}

impl PipelineOptionsBuilder {
    /// Enable or disable the PCA embedding.
    pub fn embed(mut self, embed: bool) -> Self {
        self.embed = Some(embed);
        self
    }

    /// Request k-means clustering with `k` clusters.
    pub fn cluster_k(mut self, k: usize) -> Self {
        self.cluster_k = Some(k);
        self
    }

    /// Request a pivot heat map keyed by `x` and `y`.
    pub fn pivot_columns(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.pivot_columns = Some((x.into(), y.into()));
        self
    }

    /// Set the k-means seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the k-means iteration cap.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Build the options.
    ///
    /// Returns validated `PipelineOptions` or an error if validation fails.
    pub fn build(self) -> Result<PipelineOptions, ConfigValidationError> {
        let options = PipelineOptions {
            embed: self.embed.unwrap_or(false),
            cluster_k: self.cluster_k,
            pivot_columns: self.pivot_columns,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        };

        options.validate()?;
        Ok(options)
    }
}

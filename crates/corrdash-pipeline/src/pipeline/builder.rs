//! Pipeline orchestrator.
//!
//! [`Pipeline`] runs one transform followed by the requested projections and
//! assembles a [`ResultBundle`]. A transform failure aborts the run; each
//! projection failure is confined to its own slot.

use crate::config::{ConfigValidationError, PipelineOptions, TransformConfig};
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::pipeline::bundle::{ResultBundle, Slot};
use crate::pipeline::cache::{CacheKey, PipelineCache};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::projection::{KMeans, embed, pivot};
use crate::transform;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Run the full pipeline once, without cache or progress reporting.
///
/// Returns `Err` only when the options are invalid or the transform fails.
/// Projection failures are reported inside the bundle.
pub fn run_pipeline(
    dataset: Dataset,
    config: &TransformConfig,
    options: &PipelineOptions,
) -> Result<ResultBundle> {
    Pipeline::builder()
        .options(options.clone())
        .build()?
        .run(dataset, config)
}

/// Configured pipeline, reusable across requests.
///
/// # Example
///
/// ```rust,ignore
/// use corrdash_pipeline::{Pipeline, PipelineCache, PipelineOptions, TransformConfig};
/// use std::sync::Arc;
///
/// let cache = Arc::new(PipelineCache::new());
/// let pipeline = Pipeline::builder()
///     .options(PipelineOptions::builder().embed(true).cluster_k(3).build()?)
///     .cache(cache.clone())
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?;
///
/// let bundle = pipeline.run(dataset, &TransformConfig::Scaling)?;
/// ```
pub struct Pipeline {
    options: PipelineOptions,
    cache: Option<Arc<PipelineCache>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Transform `dataset` and compute the requested projections.
    ///
    /// # Errors
    ///
    /// Configuration and empty-dataset errors from the transform, and
    /// [`PipelineError::Cancelled`] when the token fires between stages.
    pub fn run(&self, dataset: Dataset, config: &TransformConfig) -> Result<ResultBundle> {
        match self.run_internal(&dataset, config) {
            Ok(bundle) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed"));
                Ok(bundle)
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!("Pipeline cancelled");
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    error!("Pipeline error: {}", e);
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, dataset: &Dataset, config: &TransformConfig) -> Result<ResultBundle> {
        let start_time = Instant::now();
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            "Starting pipeline...",
        ));
        info!(
            "Running '{}' on {} rows x {} columns",
            config.label(),
            dataset.height(),
            dataset.width()
        );

        config.validate()?;
        self.check_cancelled()?;

        let key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(dataset, config, &self.options));
        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(bundle) = cache.get(key)
        {
            info!("Serving '{}' from cache", config.label());
            return Ok(bundle);
        }

        // Step 1: transform
        self.report_progress(ProgressUpdate::with_sub_stage(
            PipelineStage::Transforming,
            config.label(),
            0.0,
            format!("Applying {}...", config.label()),
        ));
        let transformed = transform::apply(dataset, config)?;
        self.report_progress(ProgressUpdate::with_items(
            PipelineStage::Transforming,
            config.label(),
            transformed.width(),
            transformed.width(),
            format!("Transformed {} columns", transformed.width()),
        ));

        // Step 2: projections, each confined to its slot
        self.check_cancelled()?;
        if !self.options.any_projection() {
            debug!("No projections requested");
        }
        let embedding = if self.options.embed {
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Embedding,
                0.0,
                "Computing PCA embedding...",
            ));
            Slot::from_result("Embedding", embed(&transformed))
        } else {
            Slot::NotRequested
        };

        self.check_cancelled()?;
        let clusters = match self.options.cluster_k {
            Some(k) => {
                self.report_progress(ProgressUpdate::with_sub_stage(
                    PipelineStage::Clustering,
                    format!("k = {}", k),
                    0.0,
                    "Running k-means...",
                ));
                let kmeans = KMeans::new(k)
                    .with_seed(self.options.seed)
                    .with_max_iterations(self.options.max_iterations);
                Slot::from_result("Clustering", kmeans.fit(&transformed))
            }
            None => Slot::NotRequested,
        };

        self.check_cancelled()?;
        let pivot = match &self.options.pivot_columns {
            Some((x, y)) => {
                self.report_progress(ProgressUpdate::with_sub_stage(
                    PipelineStage::Pivoting,
                    format!("{} x {}", x, y),
                    0.0,
                    "Aggregating pivot table...",
                ));
                Slot::from_result("Pivot", pivot(&transformed, x, y))
            }
            None => Slot::NotRequested,
        };

        let bundle = ResultBundle {
            transform_label: config.label(),
            transformed,
            embedding,
            clusters,
            pivot,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        debug!("Pipeline finished in {} ms", bundle.duration_ms);
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, bundle.clone());
        }

        Ok(bundle)
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    options: Option<PipelineOptions>,
    cache: Option<Arc<PipelineCache>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Share a result cache between pipelines.
    pub fn cache(mut self, cache: Arc<PipelineCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Shorthand for a closure-backed [`ProgressReporter`].
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let options = self.options.unwrap_or_default();
        options.validate()?;

        Ok(Pipeline {
            options,
            cache: self.cache,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

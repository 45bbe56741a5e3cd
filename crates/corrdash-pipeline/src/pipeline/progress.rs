//! Progress reporting and cancellation for pipeline runs.
//!
//! A host that runs the pipeline on a worker thread can watch it through a
//! [`ProgressReporter`] and stop it with a shared [`CancellationToken`]. The
//! token is checked between stages, so a projection that has started always
//! finishes before the run stops.
//!
//! # Example
//!
//! ```rust,ignore
//! use corrdash_pipeline::{CancellationToken, Pipeline, TransformConfig};
//!
//! let token = CancellationToken::new();
//! let stop = token.clone();
//! std::thread::spawn(move || stop.cancel());
//!
//! let bundle = Pipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message))
//!     .build()?
//!     .run(dataset, &TransformConfig::Derivative);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validating the request
    Initializing,
    /// Applying the transform operator
    Transforming,
    /// Computing the PCA embedding
    Embedding,
    /// Running k-means
    Clustering,
    /// Building the pivot table
    Pivoting,
    /// Run finished
    Complete,
    /// Run stopped by the cancellation token
    Cancelled,
    /// Run aborted with an error
    Failed,
}

impl PipelineStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Transforming => "Transforming Signals",
            Self::Embedding => "Computing Embedding",
            Self::Clustering => "Clustering Rows",
            Self::Pivoting => "Building Pivot Table",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole run spent in this stage. Working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::Transforming => 0.30,
            Self::Embedding => 0.25,
            Self::Clustering => 0.25,
            Self::Pivoting => 0.15,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Overall progress when this stage starts.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Transforming => 0.05,
            Self::Embedding => 0.35,
            Self::Clustering => 0.60,
            Self::Pivoting => 0.85,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Finer-grained position, e.g. `"Column: speed"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    fn at(stage: PipelineStage, stage_progress: f32, message: String) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + stage.weight() * stage_progress;
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message,
            items_processed: None,
            items_total: None,
        }
    }

    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        Self::at(stage, stage_progress, message.into())
    }

    pub fn with_sub_stage(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sub_stage: Some(sub_stage.into()),
            ..Self::at(stage, stage_progress, message.into())
        }
    }

    /// Progress expressed as `current` of `total` items.
    pub fn with_items(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::at(stage, stage_progress, message.into())
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            progress: 1.0,
            stage_progress: 1.0,
            ..Self::at(PipelineStage::Complete, 1.0, message.into())
        }
    }

    pub fn cancelled() -> Self {
        Self::at(
            PipelineStage::Cancelled,
            0.0,
            "Pipeline cancelled by user".to_string(),
        )
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::at(PipelineStage::Failed, 0.0, message.into())
    }
}

/// Receiver of progress events.
///
/// Reporters are called on the thread running the pipeline and must not
/// block it for long.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for stopping a run from another thread.
///
/// Clones share state. A run that sees the flag set returns
/// [`PipelineError::Cancelled`](crate::error::PipelineError::Cancelled).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can guard another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // ========================================================================
    // CancellationToken
    // ========================================================================

    #[test]
    fn test_token_starts_clear() {
        assert!(!CancellationToken::new().is_cancelled());
        assert!(!CancellationToken::default().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_across_threads() {
        let token = CancellationToken::new();
        let remote = token.clone();

        std::thread::spawn(move || remote.cancel())
            .join()
            .expect("Thread should not panic");

        assert!(token.is_cancelled());
    }

    // ========================================================================
    // ProgressUpdate
    // ========================================================================

    #[test]
    fn test_update_progress_is_weighted() {
        let update = ProgressUpdate::new(PipelineStage::Transforming, 0.5, "Differencing");
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.20).abs() < 1e-6);
        assert!(update.sub_stage.is_none());
    }

    #[test]
    fn test_update_with_items() {
        let update = ProgressUpdate::with_items(
            PipelineStage::Transforming,
            "Column: speed",
            1,
            4,
            "Scaling speed",
        );
        assert_eq!(update.sub_stage.as_deref(), Some("Column: speed"));
        assert_eq!(update.stage_progress, 0.25);
        assert_eq!(update.items_processed, Some(1));
        assert_eq!(update.items_total, Some(4));
    }

    #[test]
    fn test_terminal_updates() {
        let done = ProgressUpdate::complete("Done");
        assert_eq!(done.stage, PipelineStage::Complete);
        assert_eq!(done.progress, 1.0);

        assert_eq!(ProgressUpdate::cancelled().stage, PipelineStage::Cancelled);
        assert_eq!(ProgressUpdate::failed("boom").message, "boom");
    }

    #[test]
    fn test_stage_weights_sum_to_one() {
        let total: f32 = [
            PipelineStage::Initializing,
            PipelineStage::Transforming,
            PipelineStage::Embedding,
            PipelineStage::Clustering,
            PipelineStage::Pivoting,
        ]
        .iter()
        .map(|stage| stage.weight())
        .sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        let stages = [
            PipelineStage::Initializing,
            PipelineStage::Transforming,
            PipelineStage::Embedding,
            PipelineStage::Clustering,
            PipelineStage::Pivoting,
            PipelineStage::Complete,
        ];
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_update_serialization() {
        let update = ProgressUpdate::with_sub_stage(
            PipelineStage::Clustering,
            "k = 3",
            0.0,
            "Running k-means",
        );
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"stage\":\"clustering\""));
        assert!(json.contains("\"sub_stage\":\"k = 3\""));
        assert!(!json.contains("items_total"));
    }

    #[test]
    fn test_closure_reporter_counts_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let reporter = ClosureProgressReporter::new(move |_update| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Embedding, 0.0, "PCA"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

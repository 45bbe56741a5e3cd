//! Pipeline module.
//!
//! Orchestration of one transform plus optional projections, with result
//! caching, progress reporting and cancellation.

mod builder;
mod bundle;
mod cache;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, run_pipeline};
pub use bundle::{CLUSTER_COLUMN, ResultBundle, Slot, SlotError};
pub use cache::{CacheKey, DEFAULT_CACHE_CAPACITY, PipelineCache};
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};

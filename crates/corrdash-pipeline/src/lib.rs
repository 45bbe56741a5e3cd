//! Signal Correlation Pipeline Library
//!
//! The computational core of a correlation dashboard for drive recordings,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! A numeric [`Dataset`] flows through one preprocessing operator and then
//! into any combination of projections:
//!
//! - **Transforms**: identity, first derivative, z-score scaling, trailing
//!   moving average ([`transform::apply`])
//! - **Embedding**: two-component PCA ([`embed`])
//! - **Clustering**: seeded k-means ([`cluster`])
//! - **Pivot**: mean aggregation over two key columns ([`pivot`])
//! - **Orchestration**: [`run_pipeline`] or a reusable [`Pipeline`] with
//!   caching, progress reporting and cancellation
//!
//! Alongside the pipeline sit the distribution view ([`profiler`]), the
//! multi-signal time series ([`signals`]) and bicycle-model path
//! reconstruction ([`reconstruction`]).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use corrdash_pipeline::{Dataset, PipelineOptions, TransformConfig, run_pipeline};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("drive.csv".into()))?
//!     .finish()?;
//! let dataset = Dataset::from_dataframe(&df)?;
//!
//! let options = PipelineOptions::builder()
//!     .embed(true)
//!     .cluster_k(3)
//!     .pivot_columns("gear", "lane")
//!     .build()?;
//!
//! let bundle = run_pipeline(dataset, &TransformConfig::Smoothing { window: 5 }, &options)?;
//! println!("{}", bundle.transform_label);
//! if let Some(clusters) = bundle.clusters.value() {
//!     println!("cluster sizes: {:?}", clusters.cluster_sizes());
//! }
//! ```
//!
//! # Errors
//!
//! A failing transform aborts the request with a [`PipelineError`]. A failing
//! projection does not: its slot in the [`ResultBundle`] holds the error code
//! and message while the other slots are still filled.

pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod profiler;
pub mod projection;
pub mod reconstruction;
pub mod signals;
pub mod transform;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, PipelineOptions, PipelineOptionsBuilder, TransformConfig,
};
pub use dataset::Dataset;
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use pipeline::{
    CLUSTER_COLUMN, CacheKey, CancellationToken, ClosureProgressReporter, Pipeline,
    PipelineBuilder, PipelineCache, PipelineStage, ProgressReporter, ProgressUpdate,
    ResultBundle, Slot, SlotError, run_pipeline,
};
pub use profiler::{
    ColumnSummary, HistogramBin, JointHistogram, SummaryComparison, describe, describe_many,
    histogram, joint_histogram,
};
pub use projection::{
    Aggregation, ClusterAssignment, EmbeddingResult, KMeans, PivotTable, PivotWarning, cluster,
    cluster_with_seed, embed, pivot,
};
pub use reconstruction::{PathReconstructor, VehiclePath, reconstruct_path};
pub use signals::{SignalTrace, signal_traces, time_axis};
pub use transform::apply;

static_assertions::assert_impl_all!(Dataset: Send, Sync);
static_assertions::assert_impl_all!(ResultBundle: Send, Sync);

//! Error types for the signal pipeline.
//!
//! This module provides the error hierarchy shared by every transform and
//! projection, built with `thiserror`.
//!
//! Errors are serializable so a host UI can receive them as `{code, message}`
//! pairs and decide how to surface each kind to the user.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad operator parameters (window out of range, unknown transform, bad k).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The dataset has zero rows or zero columns.
    #[error("Dataset is empty (zero rows or zero columns)")]
    EmptyDataset,

    /// Too few rows or columns for the requested algorithm.
    #[error("Insufficient data for {what}: need at least {required}, got {actual}")]
    InsufficientData {
        what: String,
        required: usize,
        actual: usize,
    },

    /// Numeric failure inside an adapter (non-finite values, failed decomposition).
    #[error("Computation failed: {0}")]
    Computation(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The columns handed to a dataset constructor do not form a valid table.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Pipeline was cancelled by the host.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Shorthand for [`PipelineError::InsufficientData`].
    pub fn insufficient(what: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            what: what.into(),
            required,
            actual,
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    ///
    /// These codes let the host tell a configuration mistake (fixable by the
    /// user) apart from a dataset that is simply too small for the request.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::Computation(_) => "COMPUTATION_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidDataset(_) => "INVALID_DATASET",
            Self::Cancelled => "CANCELLED",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the user can recover by changing the request
    /// (a different configuration, column choice or dataset).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Configuration(_)
            | Self::EmptyDataset
            | Self::InsufficientData { .. }
            | Self::ColumnNotFound(_)
            | Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

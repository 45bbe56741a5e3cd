//! Result types assembled by the orchestrator.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::projection::{ClusterAssignment, EmbeddingResult, PivotTable};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the column that [`ResultBundle::labeled_dataset`] appends.
pub const CLUSTER_COLUMN: &str = "cluster";

/// Error recorded in a failed projection slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotError {
    pub code: String,
    pub message: String,
    /// Whether a different request (k, columns, dataset) can succeed.
    pub recoverable: bool,
}

impl From<&PipelineError> for SlotError {
    fn from(error: &PipelineError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        }
    }
}

/// Outcome of one optional projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Slot<T> {
    NotRequested,
    Ready { value: T },
    Failed { error: SlotError },
}

impl<T> Slot<T> {
    /// Record a projection result, logging failures.
    pub fn from_result(name: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Ready { value },
            Err(error) => {
                warn!("{} failed: {}", name, error);
                Self::Failed {
                    error: SlotError::from(&error),
                }
            }
        }
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::NotRequested)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ready { value } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SlotError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Everything a renderer needs for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ResultBundle {
    /// Label of the transform, e.g. `"Smoothing (Window: 5)"`.
    pub transform_label: String,
    pub transformed: Dataset,
    pub embedding: Slot<EmbeddingResult>,
    pub clusters: Slot<ClusterAssignment>,
    pub pivot: Slot<PivotTable>,
    /// Wall-clock time of the run that produced this bundle.
    pub duration_ms: u64,
}

impl ResultBundle {
    /// Copy of the transformed data with cluster labels appended as a
    /// `cluster` column. Without a clustering result this is a plain copy.
    pub fn labeled_dataset(&self) -> Result<Dataset> {
        match self.clusters.value() {
            Some(assignment) => self
                .transformed
                .with_column(CLUSTER_COLUMN, assignment.labels_as_f64()),
            None => Ok(self.transformed.clone()),
        }
    }

    /// Slots that failed, as `(name, error)` pairs.
    pub fn failures(&self) -> Vec<(&'static str, &SlotError)> {
        [
            ("embedding", self.embedding.error()),
            ("clusters", self.clusters.error()),
            ("pivot", self.pivot.error()),
        ]
        .into_iter()
        .filter_map(|(name, error)| error.map(|e| (name, e)))
        .collect()
    }
}

/// Equality ignores `duration_ms`, so re-running a request compares equal.
impl PartialEq for ResultBundle {
    fn eq(&self, other: &Self) -> bool {
        self.transform_label == other.transform_label
            && self.transformed == other.transformed
            && self.embedding == other.embedding
            && self.clusters == other.clusters
            && self.pivot == other.pivot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(clusters: Slot<ClusterAssignment>) -> ResultBundle {
        ResultBundle {
            transform_label: "None".to_string(),
            transformed: Dataset::from_columns([("speed", vec![1.0, 2.0])]).unwrap(),
            embedding: Slot::NotRequested,
            clusters,
            pivot: Slot::NotRequested,
            duration_ms: 3,
        }
    }

    fn assignment() -> ClusterAssignment {
        ClusterAssignment {
            labels: vec![0, 1],
            k: 2,
            centroids: vec![vec![1.0], vec![2.0]],
            inertia: 0.0,
            iterations: 1,
            converged: true,
        }
    }

    #[test]
    fn test_slot_from_result() {
        let ok: Slot<u8> = Slot::from_result("test", Ok(4));
        assert_eq!(ok.value(), Some(&4));
        assert!(ok.is_requested());

        let failed: Slot<u8> = Slot::from_result("test", Err(PipelineError::EmptyDataset));
        assert_eq!(failed.error().map(|e| e.code.as_str()), Some("EMPTY_DATASET"));
        assert!(!failed.is_ready());

        assert!(!Slot::<u8>::NotRequested.is_requested());
    }

    #[test]
    fn test_slot_serialization() {
        let json = serde_json::to_value(Slot::<u8>::NotRequested).unwrap();
        assert_eq!(json["status"], "not_requested");

        let json = serde_json::to_value(Slot::Ready { value: 7u8 }).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["value"], 7);

        let failed: Slot<u8> = Slot::from_result(
            "test",
            Err(PipelineError::insufficient("k-means rows", 5, 3)),
        );
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["code"], "INSUFFICIENT_DATA");
        assert_eq!(json["error"]["recoverable"], true);
    }

    #[test]
    fn test_slot_error_recoverable_flag() {
        let user_fixable: Slot<u8> = Slot::from_result(
            "test",
            Err(PipelineError::ColumnNotFound("lane".to_string()).with_context("pivot")),
        );
        assert_eq!(user_fixable.error().map(|e| e.recoverable), Some(true));

        let numeric: Slot<u8> =
            Slot::from_result("test", Err(PipelineError::Computation("NaN".to_string())));
        assert_eq!(numeric.error().map(|e| e.recoverable), Some(false));
    }

    #[test]
    fn test_labeled_dataset_appends_cluster_column() {
        let labeled = bundle(Slot::Ready {
            value: assignment(),
        })
        .labeled_dataset()
        .unwrap();
        assert_eq!(labeled.column_names(), vec!["speed", CLUSTER_COLUMN]);
        assert_eq!(labeled.values(CLUSTER_COLUMN).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_labeled_dataset_without_clusters() {
        let b = bundle(Slot::NotRequested);
        assert_eq!(b.labeled_dataset().unwrap(), b.transformed);
    }

    #[test]
    fn test_equality_ignores_duration() {
        let a = bundle(Slot::NotRequested);
        let mut b = a.clone();
        b.duration_ms = 999;
        assert_eq!(a, b);
    }

    #[test]
    fn test_failures() {
        let b = bundle(Slot::from_result(
            "clusters",
            Err(PipelineError::Configuration("k".to_string())),
        ));
        let failures = b.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "clusters");
    }
}

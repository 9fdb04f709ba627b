//! Errors raised while reconciling a Release.

use release_storage::{ErrorCategory, StorageError};
use thiserror::Error;

/// Why a reconciliation step failed.
///
/// Every variant except transient store failures is settled: it is written to
/// the Release status and the key is not retried until the Release changes.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: String, key: String },

    #[error(
        "no ReleaseLink found in target workspace '{target}' with target '{origin}' and application '{application}'"
    )]
    NoMatchingTarget {
        target: String,
        origin: String,
        application: String,
    },

    #[error(
        "multiple ReleaseLinks found in target workspace '{target}' for application '{application}': {}",
        candidates.join(", ")
    )]
    AmbiguousTarget {
        target: String,
        application: String,
        candidates: Vec<String>,
    },

    #[error("{kind} \"{key}\" does not set {field}")]
    InvalidReference {
        kind: String,
        key: String,
        field: String,
    },

    #[error("{kind} \"{key}\" already exists")]
    CreateConflict { kind: String, key: String },

    #[error(transparent)]
    Store(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn not_found(kind: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    pub fn create_conflict(kind: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::CreateConflict {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Whether the work queue should retry the key with backoff.
    ///
    /// Only store failures the backend reports as transient qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Storage category of the underlying store failure, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Store(e) => Some(e.category()),
            _ => None,
        }
    }

    /// Short label used as the `reason` field in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NoMatchingTarget { .. } => "no_matching_target",
            Self::AmbiguousTarget { .. } => "ambiguous_target",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::CreateConflict { .. } => "create_conflict",
            Self::Store(_) => "store",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_target_message() {
        let err = ReconcileError::NoMatchingTarget {
            target: "team-b".into(),
            origin: "team-a".into(),
            application: "app1".into(),
        };
        assert_eq!(
            err.to_string(),
            "no ReleaseLink found in target workspace 'team-b' with target 'team-a' and application 'app1'"
        );
    }

    #[test]
    fn test_ambiguous_target_lists_candidates() {
        let err = ReconcileError::AmbiguousTarget {
            target: "team-b".into(),
            application: "app1".into(),
            candidates: vec!["link2".into(), "link3".into()],
        };
        assert!(err.to_string().ends_with(": link2, link3"));
    }

    #[test]
    fn test_only_transient_store_errors_retry() {
        assert!(ReconcileError::from(StorageError::connection_error("refused")).is_retryable());
        assert!(ReconcileError::from(StorageError::version_conflict("1", "2")).is_retryable());
        assert!(!ReconcileError::from(StorageError::not_found("Release", "a/b")).is_retryable());
        assert!(!ReconcileError::from(StorageError::invalid_object("bad")).is_retryable());
        assert!(!ReconcileError::not_found("ReleaseLink", "team-a/link1").is_retryable());
        assert!(!ReconcileError::create_conflict("PipelineRun", "team-b/run").is_retryable());
    }

    #[test]
    fn test_category_only_for_store_errors() {
        let err = ReconcileError::from(StorageError::connection_error("refused"));
        assert_eq!(err.category(), Some(ErrorCategory::Infrastructure));
        assert_eq!(err.category().map(ErrorCategory::as_str), Some("infrastructure"));

        let err = ReconcileError::from(StorageError::version_conflict("1", "2"));
        assert_eq!(err.category(), Some(ErrorCategory::Conflict));

        assert_eq!(ReconcileError::not_found("ReleaseLink", "team-a/link1").category(), None);
    }

    #[test]
    fn test_not_found_message_contains_not_found() {
        let err = ReconcileError::not_found("ReleaseLink", "team-a/link1");
        assert_eq!(err.to_string(), "ReleaseLink \"team-a/link1\" not found");
    }
}

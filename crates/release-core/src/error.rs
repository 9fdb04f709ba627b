use thiserror::Error;

/// Core error types for resource handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Invalid object: {message}")]
    InvalidObject { message: String },

    #[error("Kind mismatch: expected {expected}, found {actual}")]
    KindMismatch { expected: String, actual: String },
}

impl CoreError {
    /// Create a new InvalidName error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// Create a new InvalidObject error
    pub fn invalid_object(message: impl Into<String>) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    /// Create a new KindMismatch error
    pub fn kind_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::KindMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_error() {
        let err = CoreError::invalid_name("Bad_Name");
        assert_eq!(err.to_string(), "Invalid object name: Bad_Name");
    }

    #[test]
    fn test_kind_mismatch_error() {
        let err = CoreError::kind_mismatch("Release", "ReleaseLink");
        assert_eq!(
            err.to_string(),
            "Kind mismatch: expected Release, found ReleaseLink"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CoreError::JsonError(_)));
        assert!(err.to_string().starts_with("JSON serialization error"));
    }
}

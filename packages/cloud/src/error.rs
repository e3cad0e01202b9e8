//! Error types for compute-fabric operations

use thiserror::Error;

pub type CloudResult<T> = Result<T, CloudError>;

/// Compute-fabric operation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Operation timed out after {attempts} polls: {operation}")]
    OperationTimeout { operation: String, attempts: u32 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CloudError {
    /// Create a network error from any displayable cause
    pub fn network(cause: impl std::fmt::Display) -> Self {
        CloudError::Network(cause.to_string())
    }

    /// Create an API error for an unexpected status code
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        CloudError::Api {
            status,
            message: message.into(),
        }
    }

    /// True when the fabric reported the resource as absent.
    /// Deletes that own idempotency treat this as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(CloudError::NotFound("vm-abc12".to_string()).is_not_found());
        assert!(!CloudError::api(500, "boom").is_not_found());
        assert!(!CloudError::Network("timeout".to_string()).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = CloudError::api(409, "instance busy");
        assert_eq!(err.to_string(), "API error (409): instance busy");

        let err = CloudError::OperationTimeout {
            operation: "https://fabric/ops/1".to_string(),
            attempts: 60,
        };
        assert!(err.to_string().contains("60 polls"));
    }
}

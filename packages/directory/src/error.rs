//! Error types for directory operations

use thiserror::Error;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Directory resource not found: {0}")]
    NotFound(String),

    #[error("Directory API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DirectoryError {
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Self::Network(cause.to_string())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Cleanup paths treat a missing resource as already removed
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

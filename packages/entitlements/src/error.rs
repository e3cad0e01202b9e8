use thiserror::Error;

/// Result type for entitlement store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Entitlement store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Concurrent modification of entry {0}: revision mismatch")]
    Conflict(String),

    #[error("Duplicate purchase id: {0}")]
    DuplicateEntry(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Check if this is a lost-update conflict the caller may retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

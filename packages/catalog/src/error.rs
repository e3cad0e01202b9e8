use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog-specific error types
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

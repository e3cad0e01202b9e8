// ABOUTME: Error types for the provisioning engine
// ABOUTME: Wraps fabric failures and engine-level preconditions

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Provisioning engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Control-plane call failed
    #[error("Fabric error: {0}")]
    Fabric(#[from] labrack_cloud::CloudError),

    /// No instance exists where one was expected
    #[error("No instance found in namespace {0}")]
    InstanceNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// True when the underlying fabric reported the resource as absent
    pub fn is_not_found(&self) -> bool {
        match self {
            EngineError::Fabric(e) => e.is_not_found(),
            EngineError::InstanceNotFound(_) => true,
            EngineError::Configuration(_) => false,
        }
    }
}

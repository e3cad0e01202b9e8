//! Error types for gateway operations

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway resource not found: {0}")]
    NotFound(String),

    #[error("Gateway API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Self::Network(cause.to_string())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Unbind treats a missing user as already unbound
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ABOUTME: Error types for lab lifecycle operations
// ABOUTME: Separates terminal entitlement refusals from retryable provisioning failures

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type LaunchResult<T> = Result<T, LaunchError>;

/// Lab lifecycle errors
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Unknown purchase, or the entry belongs to another user or course
    #[error("No lab entitlement matches purchase {0}")]
    EntitlementMismatch(String),

    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Lab access expired on {0}")]
    AccessExpired(DateTime<Utc>),

    #[error("All {0} lab launches have been used")]
    LaunchLimitReached(i64),

    #[error("No active lab session for purchase {0}")]
    NoActiveSession(String),

    /// Control-plane failure while creating lab resources. The consumed
    /// launch is not refunded.
    #[error("Lab provisioning failed: {0}")]
    ProvisioningFailed(#[from] labrack_provisioner::EngineError),

    #[error("Entitlement store error: {0}")]
    Store(#[from] labrack_entitlements::StoreError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] labrack_catalog::CatalogError),
}

impl LaunchError {
    /// True for entitlement refusals no retry can fix
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LaunchError::EntitlementMismatch(_)
                | LaunchError::AccessExpired(_)
                | LaunchError::LaunchLimitReached(_)
        )
    }
}

//! Labrack Identity Directory Package
//!
//! Some courses give the learner a real account in the cloud portal, scoped
//! to their lab namespace. This package creates those throwaway directory
//! users, binds a role and a policy guardrail to the namespace, and removes
//! everything again when the lab closes.

pub mod api;
pub mod error;
pub mod http;
pub mod identity;
pub mod types;

pub use api::DirectoryApi;
pub use error::{DirectoryError, DirectoryResult};
pub use http::{DirectoryConfig, HttpDirectory};
pub use identity::{IdentityConfig, IdentityManager, IdentityProvisioner};
pub use types::{BindingOutcome, DirectoryUser, LabIdentity, RoleAssignment, UserLabels, UserSpec};

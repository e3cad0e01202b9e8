//! Directory API surface, expressed as a trait so the identity manager and
//! its tests do not care which backend serves it

use async_trait::async_trait;

use crate::error::DirectoryResult;
use crate::types::{DirectoryUser, RoleAssignment, UserSpec};

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Returns the new user's directory id
    async fn create_user(&self, spec: &UserSpec) -> DirectoryResult<String>;

    async fn get_user(&self, username: &str) -> DirectoryResult<Option<DirectoryUser>>;

    /// Users whose names start with the given prefix
    async fn list_users(&self, prefix: &str) -> DirectoryResult<Vec<DirectoryUser>>;

    async fn delete_user(&self, username: &str) -> DirectoryResult<()>;

    /// Grant a role to a principal at a namespace scope. The assignment id
    /// is caller-chosen so the call stays idempotent.
    async fn assign_role(
        &self,
        scope: &str,
        assignment_id: &str,
        principal_id: &str,
        role_id: &str,
    ) -> DirectoryResult<()>;

    async fn list_role_assignments(&self, scope: &str) -> DirectoryResult<Vec<RoleAssignment>>;

    async fn delete_role_assignment(&self, scope: &str, assignment_id: &str)
        -> DirectoryResult<()>;

    /// Attach a policy to a namespace scope under a well-known name
    async fn assign_policy(&self, scope: &str, name: &str, policy_id: &str)
        -> DirectoryResult<()>;

    async fn delete_policy_assignment(&self, scope: &str, name: &str) -> DirectoryResult<()>;
}

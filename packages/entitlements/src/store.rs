use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::LabEntry;

/// Input for granting a new lab seat
#[derive(Debug, Clone, Default)]
pub struct EntryCreateInput {
    pub user_id: String,
    pub course_id: String,
    /// Generated when not supplied
    pub purchase_id: Option<String>,
    pub max_launches: Option<i64>,
    pub session_duration_hours: Option<i64>,
}

/// Persistence boundary for lab entitlements.
///
/// `save` is an atomic read-modify-write: it only applies when the
/// entry's stored revision matches the one the caller loaded, so two
/// concurrent pipelines cannot clobber each other's session state.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Grant a seat; fails on duplicate purchase id
    async fn create_entry(&self, input: EntryCreateInput) -> StoreResult<LabEntry>;

    /// Fetch one entry by purchase id, `None` when unknown
    async fn get_entry(&self, purchase_id: &str) -> StoreResult<Option<LabEntry>>;

    /// Persist a mutated entry. Bumps `entry.revision` on success;
    /// fails with `Conflict` when the stored revision has moved.
    async fn save(&self, entry: &mut LabEntry) -> StoreResult<()>;

    /// All entries belonging to one user
    async fn list_entries(&self, user_id: &str) -> StoreResult<Vec<LabEntry>>;

    /// All entries that currently hold an active session (sweep input)
    async fn list_with_active_sessions(&self) -> StoreResult<Vec<LabEntry>>;
}

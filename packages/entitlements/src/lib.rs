//! Lab entitlement model and persistence.
//!
//! A `LabEntry` is one purchased seat of a course for one user: its launch
//! budget, access window, sticky resource namespace, snapshot reference,
//! and (at most one) active session. Entries are created when a seat is
//! granted and mutated exclusively by the session orchestrator afterwards.

pub mod error;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteEntitlementStore;
pub use store::{EntitlementStore, EntryCreateInput};
pub use types::{
    ActiveSession, ElevatedAccess, GatewayBinding, LabEntry, LaunchRecord, SessionStatus,
    SnapshotRef, DEFAULT_ACCESS_WINDOW_DAYS, DEFAULT_MAX_LAUNCHES, DEFAULT_SESSION_DURATION_HOURS,
};

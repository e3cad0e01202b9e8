// ABOUTME: Snapshot lifecycle for lab system disks
// ABOUTME: Captures snapshots from quiesced instances, rotates old ones, finds the latest

pub mod error;
pub mod manager;

pub use error::{SnapshotError, SnapshotResult};
pub use manager::{snapshot_name, SnapshotManager, Snapshotter};

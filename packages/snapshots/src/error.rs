// ABOUTME: Error types for snapshot capture and rotation
// ABOUTME: Wraps fabric errors and adds capture-specific failure cases

use labrack_cloud::CloudError;
use thiserror::Error;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Fabric error: {0}")]
    Fabric(#[from] CloudError),

    #[error("Instance {0} no longer exists; nothing to capture")]
    InstanceGone(String),

    #[error("Instance {0} reports no system disk")]
    NoSystemDisk(String),
}

// ABOUTME: Lab environment lifecycle orchestration for Labrack
// ABOUTME: Drives launch and close pipelines across entitlements, provisioning, snapshots, gateway, and directory

pub mod error;
pub mod orchestrator;
pub mod types;

// Re-export commonly used types
pub use error::{LaunchError, LaunchResult};
pub use orchestrator::{SessionOrchestrator, DEFAULT_SNAPSHOT_RETENTION};
pub use types::{CloseOutput, CloseReport, LabStatus, LaunchOutput, SweepReport};

// ABOUTME: Resource provisioning engine for Labrack lab environments
// ABOUTME: Creates and tears down namespaced cloud resources in dependency order

pub mod bootstrap;
pub mod engine;
pub mod error;
pub mod names;
pub mod types;

// Re-export commonly used types
pub use bootstrap::build_setup_script;
pub use engine::{Engine, EngineConfig, Provisioner};
pub use error::{EngineError, EngineResult};
pub use names::{namespace_name, LabNames};
pub use types::{
    InstanceRuntime, NamespaceHealth, ProvisionRequest, ProvisionedLab, RestorePoint, RuntimeView,
    StepOutcome,
};

// ABOUTME: Request and result types for the provisioning engine
// ABOUTME: Provisioning inputs, teardown step outcomes, and live runtime views

use labrack_cloud::{AdminCredentials, ImageSpec};
use serde::{Deserialize, Serialize};

/// How a namespace looked when the engine inspected it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceHealth {
    /// The fabric has no record of it
    Missing,
    /// Present and able to host another launch
    Reusable,
    /// Present but deleting or failed; must not be reused
    Terminal,
}

/// Snapshot to restore the system disk from
#[derive(Debug, Clone)]
pub struct RestorePoint {
    pub snapshot_id: String,
}

/// Inputs for one provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub namespace: String,
    /// Whether the namespace already existed before this launch.
    /// Creation is idempotent either way; this drives logging only.
    pub reuse_namespace: bool,
    pub restore_from: Option<RestorePoint>,
    pub image: ImageSpec,
    pub size: String,
    /// Packages the bootstrap script installs on fresh boots
    pub software: Vec<String>,
}

/// Resources created by a provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionedLab {
    pub namespace: String,
    pub instance_name: String,
    /// Public address, when one was allocated within the polling budget
    pub address: Option<String>,
    /// Administrative account on the instance (stable across restores)
    pub admin: AdminCredentials,
    pub restored_from_snapshot: bool,
}

/// Result of one isolated teardown step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Live view of what currently runs in a namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeView {
    pub namespace_present: bool,
    pub instance: Option<InstanceRuntime>,
}

/// Live view of a single instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRuntime {
    pub name: String,
    pub power_state: Option<String>,
    pub address: Option<String>,
}

impl InstanceRuntime {
    pub fn is_running(&self) -> bool {
        self.power_state.as_deref() == Some("running")
    }
}

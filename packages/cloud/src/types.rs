//! Request and response models for the compute-fabric control plane

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a resource namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceState {
    Ready,
    Provisioning,
    Deleting,
    Failed,
}

impl NamespaceState {
    /// A namespace can host new resources unless it is being torn down
    /// or ended up in a failed state.
    pub fn is_reusable(&self) -> bool {
        matches!(self, NamespaceState::Ready | NamespaceState::Provisioning)
    }
}

/// Namespace as reported by the fabric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub region: String,
    pub state: NamespaceState,
}

/// Identifier pair returned for created resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    pub name: String,
}

/// Subnet definition inside a network request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub name: String,
    pub prefix: String,
}

/// Network creation request (one subnet per lab network)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub address_space: String,
    pub subnet: SubnetSpec,
}

/// Network as reported by the fabric after creation
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub subnet: ResourceRef,
}

/// Public address; `address` stays unset until the fabric allocates one
#[derive(Debug, Clone, Deserialize)]
pub struct PublicAddress {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Inbound allow rule on a security group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub port: u16,
    pub priority: i32,
}

/// Security group creation request (inbound allow rules only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub rules: Vec<SecurityRule>,
}

/// Network interface creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    pub subnet_id: String,
    pub address_id: String,
    pub security_group_id: String,
}

/// Capacity pricing posture for an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub interruptible: bool,
    pub eviction_policy: String,
    pub max_price: f64,
}

/// Platform image coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

/// Where the instance's system disk comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum StorageSource {
    /// Boot fresh from a platform image
    Image { reference: ImageSpec, disk_sku: String },
    /// Attach an existing disk (restored from a snapshot)
    Attach { disk_id: String },
}

/// Administrative account baked into a fresh instance
#[derive(Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

// Passwords must never reach logs through Debug formatting.
impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Instance creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub size: String,
    pub interface_id: String,
    pub disk_name: String,
    pub storage: StorageSource,
    /// Required for image boots, absent for disk attaches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<AdminCredentials>,
    /// Base64-encoded post-boot script, image boots only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    pub pricing: PricingPolicy,
}

/// Disk reference attached to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRef {
    pub id: String,
    pub name: String,
}

/// Instance as reported by the fabric
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub os_disk: Option<DiskRef>,
}

/// Disk creation request, copied from a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSpec {
    pub name: String,
    pub source_snapshot_id: String,
    pub sku: String,
}

/// Snapshot creation request, copied from a disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub name: String,
    pub source_disk_id: String,
    pub sku: String,
}

/// Snapshot as reported by the fabric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

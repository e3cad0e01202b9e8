//! Control-plane trait implemented by the HTTP client and by test doubles

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::types::{
    DiskSpec, InstanceSpec, InstanceView, InterfaceSpec, NamespaceInfo, NetworkSpec,
    PublicAddress, ResourceRef, SecurityGroupSpec, SnapshotRecord, SnapshotSpec,
};

/// Operations the provisioning pipeline needs from the compute fabric.
///
/// Mutating calls block until the fabric reports completion, with three
/// exceptions that return once the request is accepted: namespace delete
/// (observed by the next launch's reuse check), instance create (observed
/// via address polling), and instance restart.
#[async_trait]
pub trait ComputeFabric: Send + Sync {
    /// Register a control-plane capability required by lab resources.
    /// Idempotent; repeated registration is a no-op on the fabric side.
    async fn register_capability(&self, name: &str) -> CloudResult<()>;

    /// Fetch a namespace, `None` when the fabric has no record of it
    async fn get_namespace(&self, namespace: &str) -> CloudResult<Option<NamespaceInfo>>;

    /// Create (or update in place) a namespace in the given region
    async fn create_namespace(&self, namespace: &str, region: &str) -> CloudResult<()>;

    /// Request deletion of a namespace and everything inside it.
    /// Returns on acceptance.
    async fn delete_namespace(&self, namespace: &str) -> CloudResult<()>;

    /// Create a network with its single subnet; returns the subnet ref
    async fn create_network(&self, namespace: &str, spec: &NetworkSpec)
        -> CloudResult<ResourceRef>;

    async fn create_public_address(&self, namespace: &str, name: &str)
        -> CloudResult<ResourceRef>;

    /// Read a public address; `address` is unset until allocation finishes
    async fn get_public_address(&self, namespace: &str, name: &str) -> CloudResult<PublicAddress>;

    async fn delete_public_address(&self, namespace: &str, name: &str) -> CloudResult<()>;

    async fn create_security_group(
        &self,
        namespace: &str,
        spec: &SecurityGroupSpec,
    ) -> CloudResult<ResourceRef>;

    async fn delete_security_group(&self, namespace: &str, name: &str) -> CloudResult<()>;

    async fn create_interface(&self, namespace: &str, spec: &InterfaceSpec)
        -> CloudResult<ResourceRef>;

    async fn delete_interface(&self, namespace: &str, name: &str) -> CloudResult<()>;

    /// Submit instance creation; returns on acceptance
    async fn create_instance(&self, namespace: &str, spec: &InstanceSpec) -> CloudResult<()>;

    async fn get_instance(&self, namespace: &str, name: &str) -> CloudResult<InstanceView>;

    async fn list_instances(&self, namespace: &str) -> CloudResult<Vec<InstanceView>>;

    /// Delete an instance and wait for the fabric to release it
    async fn delete_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;

    /// Request an instance restart; returns on acceptance
    async fn restart_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;

    /// Stop an instance and release its capacity; waits for completion
    /// so the system disk is quiesced before snapshotting
    async fn deallocate_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;

    /// Create a managed disk copied from a snapshot; waits for completion
    async fn create_disk_from_snapshot(
        &self,
        namespace: &str,
        spec: &DiskSpec,
    ) -> CloudResult<ResourceRef>;

    async fn delete_disk(&self, namespace: &str, name: &str) -> CloudResult<()>;

    /// Create a snapshot copied from a disk; waits for completion
    async fn create_snapshot(
        &self,
        namespace: &str,
        spec: &SnapshotSpec,
    ) -> CloudResult<SnapshotRecord>;

    async fn list_snapshots(&self, namespace: &str) -> CloudResult<Vec<SnapshotRecord>>;

    async fn delete_snapshot(&self, namespace: &str, name: &str) -> CloudResult<()>;
}

//! Labrack Compute Fabric Package
//!
//! Client for the compute-fabric control plane that hosts lab environments:
//! resource namespaces, networks, public addresses, security groups, network
//! interfaces, instances, disks, and snapshots. Mutating calls are modeled as
//! long-running operations polled to completion where completion matters.

pub mod error;
pub mod fabric;
pub mod http;
pub mod types;

// Re-export commonly used types and traits
pub use error::{CloudError, CloudResult};
pub use fabric::ComputeFabric;
pub use http::{FabricConfig, HttpFabric};
pub use types::{
    AdminCredentials, DiskRef, DiskSpec, ImageSpec, InstanceSpec, InstanceView, InterfaceSpec,
    NamespaceInfo, NamespaceState, NetworkSpec, PricingPolicy, PublicAddress, ResourceRef,
    SecurityGroupSpec, SecurityRule, SnapshotRecord, SnapshotSpec, StorageSource, SubnetSpec,
};

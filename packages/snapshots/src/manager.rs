// ABOUTME: Snapshot manager that captures, lists, rotates, and deletes lab snapshots
// ABOUTME: Deallocates the instance before capture so the disk is consistent

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labrack_cloud::{ComputeFabric, SnapshotRecord, SnapshotSpec};
use tracing::{debug, info, warn};

use crate::error::{SnapshotError, SnapshotResult};

/// Names created by this module start with this prefix; rotation and
/// latest-lookup ignore everything else in the namespace.
const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Snapshots are cold storage; the cheapest tier is fine
const SNAPSHOT_SKU: &str = "Standard_LRS";

/// Canonical snapshot name for an instance at a point in time
pub fn snapshot_name(instance: &str, at: DateTime<Utc>) -> String {
    format!("{}{}-{}", SNAPSHOT_PREFIX, instance, at.timestamp_millis())
}

#[async_trait]
pub trait Snapshotter: Send + Sync {
    /// Quiesce the instance and capture its system disk
    async fn capture(&self, namespace: &str, instance: &str) -> SnapshotResult<SnapshotRecord>;

    /// Most recent snapshot in the namespace, if any
    async fn latest(&self, namespace: &str) -> SnapshotResult<Option<SnapshotRecord>>;

    /// Delete all but the newest `keep` snapshots; returns how many went away
    async fn rotate(&self, namespace: &str, keep: usize) -> SnapshotResult<usize>;

    /// Idempotent delete
    async fn remove(&self, namespace: &str, name: &str) -> SnapshotResult<()>;
}

pub struct SnapshotManager {
    fabric: Arc<dyn ComputeFabric>,
}

impl SnapshotManager {
    pub fn new(fabric: Arc<dyn ComputeFabric>) -> Self {
        Self { fabric }
    }

    /// Snapshots this module owns, newest first
    async fn owned_snapshots(&self, namespace: &str) -> SnapshotResult<Vec<SnapshotRecord>> {
        let mut records: Vec<SnapshotRecord> = self
            .fabric
            .list_snapshots(namespace)
            .await?
            .into_iter()
            .filter(|record| record.name.starts_with(SNAPSHOT_PREFIX))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl Snapshotter for SnapshotManager {
    async fn capture(&self, namespace: &str, instance: &str) -> SnapshotResult<SnapshotRecord> {
        // Writes still in flight would tear the image; stop the instance first
        match self.fabric.deallocate_instance(namespace, instance).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(SnapshotError::InstanceGone(instance.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let view = self.fabric.get_instance(namespace, instance).await?;
        let disk = view
            .os_disk
            .ok_or_else(|| SnapshotError::NoSystemDisk(instance.to_string()))?;

        let name = snapshot_name(instance, Utc::now());
        info!("Capturing snapshot {} from disk {}", name, disk.name);
        let record = self
            .fabric
            .create_snapshot(
                namespace,
                &SnapshotSpec {
                    name,
                    source_disk_id: disk.id,
                    sku: SNAPSHOT_SKU.to_string(),
                },
            )
            .await?;
        Ok(record)
    }

    async fn latest(&self, namespace: &str) -> SnapshotResult<Option<SnapshotRecord>> {
        Ok(self.owned_snapshots(namespace).await?.into_iter().next())
    }

    async fn rotate(&self, namespace: &str, keep: usize) -> SnapshotResult<usize> {
        let records = self.owned_snapshots(namespace).await?;
        if records.len() <= keep {
            return Ok(0);
        }

        let mut removed = 0;
        for stale in &records[keep..] {
            match self.fabric.delete_snapshot(namespace, &stale.name).await {
                Ok(()) => {
                    debug!("Rotated out snapshot {}", stale.name);
                    removed += 1;
                }
                Err(e) if e.is_not_found() => {
                    removed += 1;
                }
                Err(e) => {
                    // Leave it for the next rotation rather than failing the run
                    warn!("Could not rotate snapshot {}: {}", stale.name, e);
                }
            }
        }
        Ok(removed)
    }

    async fn remove(&self, namespace: &str, name: &str) -> SnapshotResult<()> {
        match self.fabric.delete_snapshot(namespace, name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Snapshot {} already absent", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labrack_cloud::{
        CloudError, CloudResult, DiskRef, DiskSpec, InstanceSpec, InstanceView, InterfaceSpec,
        NamespaceInfo, NetworkSpec, PublicAddress, ResourceRef, SecurityGroupSpec,
    };
    use mockall::mock;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    mock! {
        Fabric {}

        #[async_trait::async_trait]
        impl ComputeFabric for Fabric {
            async fn register_capability(&self, name: &str) -> CloudResult<()>;
            async fn get_namespace(&self, namespace: &str) -> CloudResult<Option<NamespaceInfo>>;
            async fn create_namespace(&self, namespace: &str, region: &str) -> CloudResult<()>;
            async fn delete_namespace(&self, namespace: &str) -> CloudResult<()>;
            async fn create_network(&self, namespace: &str, spec: &NetworkSpec) -> CloudResult<ResourceRef>;
            async fn create_public_address(&self, namespace: &str, name: &str) -> CloudResult<ResourceRef>;
            async fn get_public_address(&self, namespace: &str, name: &str) -> CloudResult<PublicAddress>;
            async fn delete_public_address(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn create_security_group(&self, namespace: &str, spec: &SecurityGroupSpec) -> CloudResult<ResourceRef>;
            async fn delete_security_group(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn create_interface(&self, namespace: &str, spec: &InterfaceSpec) -> CloudResult<ResourceRef>;
            async fn delete_interface(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn create_instance(&self, namespace: &str, spec: &InstanceSpec) -> CloudResult<()>;
            async fn get_instance(&self, namespace: &str, name: &str) -> CloudResult<InstanceView>;
            async fn list_instances(&self, namespace: &str) -> CloudResult<Vec<InstanceView>>;
            async fn delete_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn restart_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn deallocate_instance(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn create_disk_from_snapshot(&self, namespace: &str, spec: &DiskSpec) -> CloudResult<ResourceRef>;
            async fn delete_disk(&self, namespace: &str, name: &str) -> CloudResult<()>;
            async fn create_snapshot(&self, namespace: &str, spec: &SnapshotSpec) -> CloudResult<SnapshotRecord>;
            async fn list_snapshots(&self, namespace: &str) -> CloudResult<Vec<SnapshotRecord>>;
            async fn delete_snapshot(&self, namespace: &str, name: &str) -> CloudResult<()>;
        }
    }

    fn record(name: &str, secs: i64) -> SnapshotRecord {
        SnapshotRecord {
            id: format!("/snapshots/{}", name),
            name: name.to_string(),
            created_at: DateTime::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_name_format() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            snapshot_name("vm-ab1cd", at),
            "snapshot-vm-ab1cd-1700000000000"
        );
    }

    #[tokio::test]
    async fn test_capture_quiesces_before_snapshotting() {
        let mut fabric = MockFabric::new();
        let mut seq = Sequence::new();
        fabric
            .expect_deallocate_instance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        fabric
            .expect_get_instance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, name| {
                Ok(InstanceView {
                    id: format!("/instances/{}", name),
                    name: name.to_string(),
                    power_state: Some("deallocated".to_string()),
                    os_disk: Some(DiskRef {
                        id: "/disks/vm-ab1cd-osdisk".to_string(),
                        name: "vm-ab1cd-osdisk".to_string(),
                    }),
                })
            });
        fabric
            .expect_create_snapshot()
            .withf(|_, spec: &SnapshotSpec| {
                spec.name.starts_with("snapshot-vm-ab1cd-")
                    && spec.source_disk_id == "/disks/vm-ab1cd-osdisk"
                    && spec.sku == "Standard_LRS"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, spec| Ok(record(&spec.name, 1_700_000_000)));

        let manager = SnapshotManager::new(Arc::new(fabric));
        let captured = manager.capture("lab-x", "vm-ab1cd").await.unwrap();
        assert!(captured.name.starts_with("snapshot-vm-ab1cd-"));
    }

    #[tokio::test]
    async fn test_capture_fails_when_instance_is_gone() {
        let mut fabric = MockFabric::new();
        fabric
            .expect_deallocate_instance()
            .times(1)
            .returning(|_, name| Err(CloudError::NotFound(name.to_string())));

        let manager = SnapshotManager::new(Arc::new(fabric));
        let err = manager.capture("lab-x", "vm-ab1cd").await.unwrap_err();
        assert!(matches!(err, SnapshotError::InstanceGone(_)));
    }

    #[tokio::test]
    async fn test_capture_fails_without_system_disk() {
        let mut fabric = MockFabric::new();
        fabric
            .expect_deallocate_instance()
            .returning(|_, _| Ok(()));
        fabric.expect_get_instance().returning(|_, name| {
            Ok(InstanceView {
                id: format!("/instances/{}", name),
                name: name.to_string(),
                power_state: Some("deallocated".to_string()),
                os_disk: None,
            })
        });

        let manager = SnapshotManager::new(Arc::new(fabric));
        let err = manager.capture("lab-x", "vm-ab1cd").await.unwrap_err();
        assert!(matches!(err, SnapshotError::NoSystemDisk(_)));
    }

    #[tokio::test]
    async fn test_latest_picks_newest_owned_snapshot() {
        let mut fabric = MockFabric::new();
        fabric.expect_list_snapshots().returning(|_| {
            Ok(vec![
                record("snapshot-vm-a-1000", 1_000),
                record("snapshot-vm-a-3000", 3_000),
                // Foreign snapshot is newer but must not win
                record("manual-backup", 9_000),
                record("snapshot-vm-a-2000", 2_000),
            ])
        });

        let manager = SnapshotManager::new(Arc::new(fabric));
        let latest = manager.latest("lab-x").await.unwrap().unwrap();
        assert_eq!(latest.name, "snapshot-vm-a-3000");
    }

    #[tokio::test]
    async fn test_latest_is_none_when_namespace_has_no_owned_snapshots() {
        let mut fabric = MockFabric::new();
        fabric
            .expect_list_snapshots()
            .returning(|_| Ok(vec![record("manual-backup", 9_000)]));

        let manager = SnapshotManager::new(Arc::new(fabric));
        assert!(manager.latest("lab-x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_keeps_newest_and_deletes_the_rest() {
        let mut fabric = MockFabric::new();
        fabric.expect_list_snapshots().returning(|_| {
            Ok(vec![
                record("snapshot-vm-a-1000", 1_000),
                record("snapshot-vm-a-3000", 3_000),
                record("snapshot-vm-a-2000", 2_000),
                record("manual-backup", 9_000),
            ])
        });
        fabric
            .expect_delete_snapshot()
            .withf(|_, name: &str| name == "snapshot-vm-a-2000")
            .times(1)
            .returning(|_, _| Ok(()));
        fabric
            .expect_delete_snapshot()
            .withf(|_, name: &str| name == "snapshot-vm-a-1000")
            .times(1)
            .returning(|_, _| Ok(()));

        let manager = SnapshotManager::new(Arc::new(fabric));
        let removed = manager.rotate("lab-x", 1).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_rotate_noop_when_under_the_cap() {
        let mut fabric = MockFabric::new();
        fabric
            .expect_list_snapshots()
            .returning(|_| Ok(vec![record("snapshot-vm-a-1000", 1_000)]));

        let manager = SnapshotManager::new(Arc::new(fabric));
        assert_eq!(manager.rotate("lab-x", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rotate_continues_past_a_failed_delete() {
        let mut fabric = MockFabric::new();
        fabric.expect_list_snapshots().returning(|_| {
            Ok(vec![
                record("snapshot-vm-a-3000", 3_000),
                record("snapshot-vm-a-2000", 2_000),
                record("snapshot-vm-a-1000", 1_000),
            ])
        });
        fabric
            .expect_delete_snapshot()
            .withf(|_, name: &str| name == "snapshot-vm-a-2000")
            .times(1)
            .returning(|_, _| Err(CloudError::api(500, "storage backend busy")));
        fabric
            .expect_delete_snapshot()
            .withf(|_, name: &str| name == "snapshot-vm-a-1000")
            .times(1)
            .returning(|_, _| Ok(()));

        let manager = SnapshotManager::new(Arc::new(fabric));
        let removed = manager.rotate("lab-x", 1).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_remove_tolerates_absent_snapshot() {
        let mut fabric = MockFabric::new();
        fabric
            .expect_delete_snapshot()
            .times(1)
            .returning(|_, name| Err(CloudError::NotFound(name.to_string())));

        let manager = SnapshotManager::new(Arc::new(fabric));
        assert!(manager.remove("lab-x", "snapshot-vm-a-1000").await.is_ok());
    }
}

// ABOUTME: Provisioning engine sequencing namespaced resource creation and teardown
// ABOUTME: Owns dependency ordering, restore-vs-fresh branching, and address polling

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use labrack_cloud::{
    AdminCredentials, CloudError, ComputeFabric, DiskSpec, InstanceSpec, InterfaceSpec,
    NetworkSpec, PricingPolicy, SecurityGroupSpec, SecurityRule, StorageSource, SubnetSpec,
};
use tracing::{debug, info, warn};

use crate::bootstrap::build_setup_script;
use crate::error::EngineResult;
use crate::names::LabNames;
use crate::types::{
    InstanceRuntime, NamespaceHealth, ProvisionRequest, ProvisionedLab, RuntimeView, StepOutcome,
};

/// Network layout shared by every lab
const NETWORK_ADDRESS_SPACE: &str = "10.0.0.0/16";
const SUBNET_PREFIX: &str = "10.0.0.0/24";

/// Inbound ports the remote-access path needs open
const RDP_PORT: u16 = 3389;
const SSH_PORT: u16 = 22;

/// Control-plane capabilities lab resources depend on
const REQUIRED_CAPABILITIES: [&str; 2] = ["compute", "network"];

/// Tunable engine policy; everything here is deployment posture,
/// not behavior
#[derive(Clone)]
pub struct EngineConfig {
    pub region: String,
    pub admin_username: String,
    pub admin_password: String,
    pub address_poll_attempts: u32,
    pub address_poll_interval: Duration,
    /// Request interruptible capacity for lab instances
    pub interruptible: bool,
    pub eviction_policy: String,
    /// Negative means uncapped
    pub max_capacity_price: f64,
    pub fresh_disk_sku: String,
    pub restore_disk_sku: String,
}

impl EngineConfig {
    pub fn new(region: impl Into<String>, admin_password: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            admin_username: "labadmin".to_string(),
            admin_password: admin_password.into(),
            address_poll_attempts: 30,
            address_poll_interval: Duration::from_secs(5),
            interruptible: true,
            eviction_policy: "deallocate".to_string(),
            max_capacity_price: -1.0,
            fresh_disk_sku: "StandardSSD_LRS".to_string(),
            restore_disk_sku: "Premium_LRS".to_string(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("region", &self.region)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("address_poll_attempts", &self.address_poll_attempts)
            .field("address_poll_interval", &self.address_poll_interval)
            .field("interruptible", &self.interruptible)
            .field("eviction_policy", &self.eviction_policy)
            .field("max_capacity_price", &self.max_capacity_price)
            .finish()
    }
}

/// Seam between the orchestrator and the engine
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Inspect a namespace for the launch reuse decision
    async fn namespace_health(&self, namespace: &str) -> EngineResult<NamespaceHealth>;

    /// Create everything one lab instance needs, in dependency order
    async fn provision(&self, request: &ProvisionRequest) -> EngineResult<ProvisionedLab>;

    /// Best-effort deletion of compute-only resources. The namespace and
    /// its snapshots survive for the next launch.
    async fn teardown_compute(&self, namespace: &str, instance: &str) -> Vec<StepOutcome>;

    /// Request deletion of the whole namespace; returns on acceptance
    async fn destroy_namespace(&self, namespace: &str) -> EngineResult<()>;

    /// Live view of what currently runs in a namespace
    async fn runtime_view(&self, namespace: &str) -> EngineResult<RuntimeView>;

    async fn restart_instance(&self, namespace: &str, instance: &str) -> EngineResult<()>;
}

/// Provisioning engine backed by the compute fabric
pub struct Engine {
    fabric: Arc<dyn ComputeFabric>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(fabric: Arc<dyn ComputeFabric>, config: EngineConfig) -> Self {
        Self { fabric, config }
    }

    fn admin_credentials(&self) -> AdminCredentials {
        AdminCredentials {
            username: self.config.admin_username.clone(),
            password: self.config.admin_password.clone(),
        }
    }

    /// Registration is idempotent on the fabric side and labs usually run in
    /// namespaces that already saw one, so failures only get a warning.
    async fn register_capabilities(&self) {
        for capability in REQUIRED_CAPABILITIES {
            if let Err(e) = self.fabric.register_capability(capability).await {
                warn!("Capability {} registration failed: {}", capability, e);
            }
        }
    }

    async fn poll_address(&self, namespace: &str, name: &str) -> EngineResult<Option<String>> {
        for attempt in 0..self.config.address_poll_attempts {
            let address = self.fabric.get_public_address(namespace, name).await?;
            if let Some(ip) = address.address {
                return Ok(Some(ip));
            }
            debug!(
                "Waiting for public address {} (attempt {}/{})",
                name,
                attempt + 1,
                self.config.address_poll_attempts
            );
            tokio::time::sleep(self.config.address_poll_interval).await;
        }
        Ok(None)
    }
}

fn normalize_delete(step: &str, result: Result<(), CloudError>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::succeeded(step),
        Err(e) if e.is_not_found() => {
            debug!("Teardown step {}: resource already absent", step);
            StepOutcome::succeeded(step)
        }
        Err(e) => {
            warn!("Teardown step {} failed: {}", step, e);
            StepOutcome::failed(step, e.to_string())
        }
    }
}

#[async_trait]
impl Provisioner for Engine {
    async fn namespace_health(&self, namespace: &str) -> EngineResult<NamespaceHealth> {
        match self.fabric.get_namespace(namespace).await? {
            None => Ok(NamespaceHealth::Missing),
            Some(info) if info.state.is_reusable() => Ok(NamespaceHealth::Reusable),
            Some(info) => {
                warn!(
                    "Namespace {} found in state {:?}; not reusable",
                    namespace, info.state
                );
                Ok(NamespaceHealth::Terminal)
            }
        }
    }

    async fn provision(&self, request: &ProvisionRequest) -> EngineResult<ProvisionedLab> {
        self.register_capabilities().await;

        if request.reuse_namespace {
            info!("Reusing namespace {} for new launch", request.namespace);
        } else {
            info!(
                "Creating namespace {} in {}",
                request.namespace, self.config.region
            );
        }
        // Idempotent either way; re-applying self-heals a half-created namespace
        self.fabric
            .create_namespace(&request.namespace, &self.config.region)
            .await?;

        let names = LabNames::generate();
        debug!(
            "Provisioning instance {} in {}",
            names.instance, request.namespace
        );

        let subnet = self
            .fabric
            .create_network(
                &request.namespace,
                &NetworkSpec {
                    name: names.network.clone(),
                    address_space: NETWORK_ADDRESS_SPACE.to_string(),
                    subnet: SubnetSpec {
                        name: names.subnet.clone(),
                        prefix: SUBNET_PREFIX.to_string(),
                    },
                },
            )
            .await?;

        let address_ref = self
            .fabric
            .create_public_address(&request.namespace, &names.address)
            .await?;

        let group = self
            .fabric
            .create_security_group(
                &request.namespace,
                &SecurityGroupSpec {
                    name: names.security_group.clone(),
                    rules: vec![
                        SecurityRule {
                            name: "allow-rdp".to_string(),
                            port: RDP_PORT,
                            priority: 1000,
                        },
                        SecurityRule {
                            name: "allow-ssh".to_string(),
                            port: SSH_PORT,
                            priority: 1010,
                        },
                    ],
                },
            )
            .await?;

        let interface = self
            .fabric
            .create_interface(
                &request.namespace,
                &InterfaceSpec {
                    name: names.interface.clone(),
                    subnet_id: subnet.id,
                    address_id: address_ref.id,
                    security_group_id: group.id,
                },
            )
            .await?;

        let storage = match &request.restore_from {
            Some(restore) => {
                info!("Restoring {} from snapshot", names.instance);
                let disk = self
                    .fabric
                    .create_disk_from_snapshot(
                        &request.namespace,
                        &DiskSpec {
                            name: names.disk.clone(),
                            source_snapshot_id: restore.snapshot_id.clone(),
                            sku: self.config.restore_disk_sku.clone(),
                        },
                    )
                    .await?;
                StorageSource::Attach { disk_id: disk.id }
            }
            None => StorageSource::Image {
                reference: request.image.clone(),
                disk_sku: self.config.fresh_disk_sku.clone(),
            },
        };

        let fresh = request.restore_from.is_none();
        let spec = InstanceSpec {
            name: names.instance.clone(),
            size: request.size.clone(),
            interface_id: interface.id,
            disk_name: names.disk.clone(),
            storage,
            credentials: fresh.then(|| self.admin_credentials()),
            bootstrap: fresh.then(|| build_setup_script(&request.software)),
            pricing: PricingPolicy {
                interruptible: self.config.interruptible,
                eviction_policy: self.config.eviction_policy.clone(),
                max_price: self.config.max_capacity_price,
            },
        };
        self.fabric.create_instance(&request.namespace, &spec).await?;

        let address = self.poll_address(&request.namespace, &names.address).await?;
        match &address {
            Some(ip) => info!("Instance {} reachable at {}", names.instance, ip),
            None => warn!(
                "Instance {} got no public address within the polling budget",
                names.instance
            ),
        }

        Ok(ProvisionedLab {
            namespace: request.namespace.clone(),
            instance_name: names.instance,
            address,
            admin: self.admin_credentials(),
            restored_from_snapshot: request.restore_from.is_some(),
        })
    }

    async fn teardown_compute(&self, namespace: &str, instance: &str) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();

        // Restored disks keep their original names, so learn the actual
        // name from the instance before that record disappears.
        let disk_name = match self.fabric.get_instance(namespace, instance).await {
            Ok(view) => view
                .os_disk
                .map(|disk| disk.name)
                .unwrap_or_else(|| LabNames::conventional_disk(instance)),
            Err(e) => {
                debug!("Could not read instance {} before teardown: {}", instance, e);
                LabNames::conventional_disk(instance)
            }
        };

        // Dependent resources cannot be released while the instance holds
        // them; a real instance-delete failure ends the teardown here.
        let first = normalize_delete(
            "instance",
            self.fabric.delete_instance(namespace, instance).await,
        );
        let aborted = !first.ok;
        outcomes.push(first);
        if aborted {
            return outcomes;
        }

        outcomes.push(normalize_delete(
            "interface",
            self.fabric
                .delete_interface(namespace, &LabNames::interface_for(instance))
                .await,
        ));
        outcomes.push(normalize_delete(
            "address",
            self.fabric
                .delete_public_address(namespace, &LabNames::address_for(instance))
                .await,
        ));
        outcomes.push(normalize_delete(
            "security-group",
            self.fabric
                .delete_security_group(namespace, &LabNames::security_group_for(instance))
                .await,
        ));
        outcomes.push(normalize_delete(
            "disk",
            self.fabric.delete_disk(namespace, &disk_name).await,
        ));

        outcomes
    }

    async fn destroy_namespace(&self, namespace: &str) -> EngineResult<()> {
        match self.fabric.delete_namespace(namespace).await {
            Ok(()) => {
                info!("Namespace {} deletion accepted", namespace);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Namespace {} already gone", namespace);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn runtime_view(&self, namespace: &str) -> EngineResult<RuntimeView> {
        if self.fabric.get_namespace(namespace).await?.is_none() {
            return Ok(RuntimeView {
                namespace_present: false,
                instance: None,
            });
        }

        let mut instances = self.fabric.list_instances(namespace).await?;
        if instances.is_empty() {
            return Ok(RuntimeView {
                namespace_present: true,
                instance: None,
            });
        }

        // Listings can carry stale power state; read the instance directly
        let name = instances.remove(0).name;
        let view = self.fabric.get_instance(namespace, &name).await?;
        let address = match self
            .fabric
            .get_public_address(namespace, &LabNames::address_for(&view.name))
            .await
        {
            Ok(address) => address.address,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        Ok(RuntimeView {
            namespace_present: true,
            instance: Some(InstanceRuntime {
                name: view.name,
                power_state: view.power_state,
                address,
            }),
        })
    }

    async fn restart_instance(&self, namespace: &str, instance: &str) -> EngineResult<()> {
        info!("Restarting instance {} in namespace {}", instance, namespace);
        self.fabric.restart_instance(namespace, instance).await?;
        Ok(())
    }
}

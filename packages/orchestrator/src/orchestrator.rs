// ABOUTME: Session orchestrator driving the whole lab lifecycle per purchased seat
// ABOUTME: Launch and close pipelines, live status, instance restart, and the expired-session sweep

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use labrack_catalog::{profile_for_course, CourseCatalog, ImageReference};
use labrack_cloud::ImageSpec;
use labrack_directory::IdentityProvisioner;
use labrack_entitlements::{
    ActiveSession, ElevatedAccess, EntitlementStore, GatewayBinding, LabEntry, LaunchRecord,
    SessionStatus, SnapshotRef, DEFAULT_ACCESS_WINDOW_DAYS,
};
use labrack_gateway::{RemoteTarget, SessionBinder};
use labrack_provisioner::{
    namespace_name, NamespaceHealth, ProvisionRequest, Provisioner, RestorePoint, StepOutcome,
};
use labrack_snapshots::Snapshotter;

use crate::error::{LaunchError, LaunchResult};
use crate::types::{CloseOutput, CloseReport, LabStatus, LaunchOutput, SweepReport};

/// Snapshots kept per namespace after a close rotates old ones out
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 1;

/// Coordinates every lab lifecycle operation for purchased course seats.
///
/// Each operation is a sequential pipeline of control-plane calls against
/// the entitlement store, the compute fabric, the snapshot manager, the
/// remote gateway, and the identity directory. Pipelines for different
/// purchases run concurrently; pipelines for the same purchase serialize
/// on a per-purchase lock.
pub struct SessionOrchestrator {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn CourseCatalog>,
    provisioner: Arc<dyn Provisioner>,
    snapshots: Arc<dyn Snapshotter>,
    gateway: Arc<dyn SessionBinder>,
    identities: Arc<dyn IdentityProvisioner>,
    snapshot_retention: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn CourseCatalog>,
        provisioner: Arc<dyn Provisioner>,
        snapshots: Arc<dyn Snapshotter>,
        gateway: Arc<dyn SessionBinder>,
        identities: Arc<dyn IdentityProvisioner>,
    ) -> Self {
        Self {
            store,
            catalog,
            provisioner,
            snapshots,
            gateway,
            identities,
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override how many snapshots survive each close
    pub fn with_snapshot_retention(mut self, keep: usize) -> Self {
        self.snapshot_retention = keep;
        self
    }

    /// Launch the lab for one purchased seat.
    ///
    /// Enforces the access window and launch budget, reuses or replaces the
    /// seat's resource namespace, restores from the latest snapshot when one
    /// survives, and binds gateway and portal access around the provisioned
    /// instance. The launch is counted before provisioning and never
    /// refunded.
    pub async fn launch(
        &self,
        user_id: &str,
        course_id: &str,
        purchase_id: &str,
    ) -> LaunchResult<LaunchOutput> {
        let _guard = self.entry_lock(purchase_id).await;

        let mut entry = self.load_entry(purchase_id).await?;
        if entry.user_id != user_id || entry.course_id != course_id {
            return Err(LaunchError::EntitlementMismatch(purchase_id.to_string()));
        }

        let course = self
            .catalog
            .course(course_id)
            .await?
            .ok_or_else(|| LaunchError::CourseNotFound(course_id.to_string()))?;

        let now = Utc::now();

        // The access window runs from purchase but is only materialized on
        // first launch, so seats never touched carry no expiry in storage.
        let access_expires_at = match entry.access_expires_at {
            Some(at) => at,
            None => {
                let at = entry.purchase_date + Duration::days(DEFAULT_ACCESS_WINDOW_DAYS);
                entry.access_expires_at = Some(at);
                self.store.save(&mut entry).await?;
                at
            }
        };

        if now > access_expires_at {
            info!(
                "Lab access for purchase {} expired on {}",
                purchase_id, access_expires_at
            );
            self.discard_lab(&mut entry).await?;
            return Err(LaunchError::AccessExpired(access_expires_at));
        }

        if entry.launches_exhausted() {
            info!(
                "Purchase {} has used all {} launches",
                purchase_id, entry.max_launches
            );
            self.discard_lab(&mut entry).await?;
            return Err(LaunchError::LaunchLimitReached(entry.max_launches));
        }

        // Count the launch up front. A provisioning failure after this
        // point still costs one.
        entry.launch_count += 1;
        self.store.save(&mut entry).await?;

        let mut reused_namespace = false;
        let namespace = match entry.namespace.clone() {
            Some(existing) => match self.provisioner.namespace_health(&existing).await? {
                NamespaceHealth::Reusable => {
                    debug!("Reusing namespace {}", existing);
                    reused_namespace = true;
                    existing
                }
                NamespaceHealth::Missing | NamespaceHealth::Terminal => {
                    // The snapshot lived inside that namespace, so it goes
                    // with it.
                    warn!(
                        "Namespace {} is gone or failed; discarding it and its snapshot",
                        existing
                    );
                    entry.namespace = None;
                    entry.snapshot = None;
                    namespace_name(&entry.user_id, &course.code)
                }
            },
            None => namespace_name(&entry.user_id, &course.code),
        };

        let restore_from = entry.snapshot.as_ref().map(|snapshot| RestorePoint {
            snapshot_id: snapshot.id.clone(),
        });

        // The portal identity has no namespace dependency, so it is created
        // before the slow provisioning path. Failure costs portal access
        // only, never the launch.
        let mut identity = None;
        if course.requires_elevated_portal {
            match self
                .identities
                .create_identity(&entry.user_id, &entry.course_id)
                .await
            {
                Ok(created) => identity = Some(created),
                Err(e) => warn!(
                    "Portal identity creation failed, launching without portal access: {}",
                    e
                ),
            }
        }

        let profile = profile_for_course(&course);
        info!(
            "Launching lab for purchase {} in {} (profile {}, launch {} of {})",
            purchase_id, namespace, profile.name, entry.launch_count, entry.max_launches
        );

        let request = ProvisionRequest {
            namespace: namespace.clone(),
            reuse_namespace: reused_namespace,
            restore_from,
            image: image_spec(&profile.image),
            size: profile.size,
            software: profile.software,
        };
        let lab = self.provisioner.provision(&request).await?;

        let mut elevated = None;
        if let Some(identity) = identity {
            // Credentials are kept even when binding fails; the account
            // exists and cleanup on close must find it.
            if let Err(e) = self.identities.bind_access(&identity, &namespace).await {
                warn!(
                    "Portal access binding failed for {}: {}",
                    identity.username, e
                );
            }
            elevated = Some(ElevatedAccess {
                principal: identity.username,
                password: identity.password,
                object_id: identity.id,
                namespace: namespace.clone(),
            });
        }

        let mut gateway = None;
        let mut connection_url = None;
        match &lab.address {
            Some(address) => {
                let target = RemoteTarget {
                    address: address.clone(),
                    username: lab.admin.username.clone(),
                    password: lab.admin.password.clone(),
                };
                match self.gateway.bind(&target, &namespace).await {
                    Ok(session) => {
                        connection_url = Some(self.gateway.session_url(&session));
                        gateway = Some(GatewayBinding {
                            connection_id: session.connection_id,
                            username: session.username,
                            password: session.password,
                            auth_token: session.auth_token,
                        });
                    }
                    Err(e) => warn!("Gateway binding failed, session stays provisioning: {}", e),
                }
            }
            None => info!(
                "Instance {} has no public address yet; gateway binding deferred",
                lab.instance_name
            ),
        }

        let status = if gateway.is_some() {
            SessionStatus::Running
        } else {
            SessionStatus::Provisioning
        };
        let start_time = Utc::now();
        let session_expires_at = start_time + Duration::hours(entry.session_duration_hours);
        let session = ActiveSession {
            namespace: namespace.clone(),
            instance_name: lab.instance_name.clone(),
            gateway,
            elevated,
            status,
            start_time,
            expires_at: session_expires_at,
        };

        entry.active_session = Some(session.clone());
        entry.namespace = Some(namespace);
        entry.last_accessed_at = Some(start_time);
        self.store.save(&mut entry).await?;

        info!(
            "Lab for purchase {} is {:?} on instance {}",
            purchase_id, status, lab.instance_name
        );

        Ok(LaunchOutput {
            portal_access: session.elevated.clone(),
            session,
            connection_url,
            launch_count: entry.launch_count,
            max_launches: entry.max_launches,
            remaining_launches: entry.remaining_launches(),
            access_expires_at,
            session_expires_at,
            restored_from_snapshot: lab.restored_from_snapshot,
            reused_namespace,
        })
    }

    /// Close the active session for one purchased seat.
    ///
    /// Snapshots the instance, deletes compute resources, unbinds gateway
    /// and portal access, and accrues usage. Every step is best-effort and
    /// recorded in the report; the final bookkeeping always runs. The
    /// namespace is kept so the snapshot it holds can seed the next launch.
    pub async fn close(&self, purchase_id: &str) -> LaunchResult<CloseOutput> {
        let _guard = self.entry_lock(purchase_id).await;

        let mut entry = self.load_entry(purchase_id).await?;
        let session = entry
            .active_session
            .clone()
            .ok_or_else(|| LaunchError::NoActiveSession(purchase_id.to_string()))?;

        info!(
            "Closing lab session for purchase {} in {}",
            purchase_id, session.namespace
        );
        let mut report = CloseReport::default();

        // Capture user work before anything is deleted. A failed capture
        // downgrades the close to lossy instead of aborting it.
        let mut snapshot_created = false;
        match self
            .snapshots
            .capture(&session.namespace, &session.instance_name)
            .await
        {
            Ok(record) => {
                snapshot_created = true;
                entry.snapshot = Some(SnapshotRef {
                    id: record.id,
                    name: record.name,
                    created_at: record.created_at,
                });
                report.record(StepOutcome::succeeded("snapshot"));
                match self
                    .snapshots
                    .rotate(&session.namespace, self.snapshot_retention)
                    .await
                {
                    Ok(removed) if removed > 0 => {
                        debug!(
                            "Rotated out {} old snapshots in {}",
                            removed, session.namespace
                        )
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Snapshot rotation failed in {}: {}", session.namespace, e),
                }
            }
            Err(e) => {
                warn!("Snapshot capture failed, closing without one: {}", e);
                report.record(StepOutcome::failed("snapshot", e.to_string()));
            }
        }

        let outcomes = self
            .provisioner
            .teardown_compute(&session.namespace, &session.instance_name)
            .await;
        report.extend(outcomes);

        if let Some(binding) = &session.gateway {
            match self.gateway.unbind(&binding.username).await {
                Ok(()) => report.record(StepOutcome::succeeded("gateway-user")),
                Err(e) => {
                    warn!("Gateway user {} not removed: {}", binding.username, e);
                    report.record(StepOutcome::failed("gateway-user", e.to_string()));
                }
            }
        }

        // Portal cleanup strips the identity's rights and the identity
        // itself. The namespace is never deleted here; it still holds the
        // snapshot taken above.
        if let Some(elevated) = &session.elevated {
            let bindings = self
                .identities
                .remove_bindings(&elevated.object_id, &elevated.namespace)
                .await;
            report.extend(bindings.into_iter().map(|outcome| StepOutcome {
                step: format!("portal-{}", outcome.step),
                ok: outcome.ok,
                error: outcome.error,
            }));
            match self.identities.delete_identity(&elevated.principal).await {
                Ok(()) => report.record(StepOutcome::succeeded("portal-identity")),
                Err(e) => {
                    warn!("Portal identity {} not removed: {}", elevated.principal, e);
                    report.record(StepOutcome::failed("portal-identity", e.to_string()));
                }
            }
        }

        // Bookkeeping runs regardless of what failed above.
        let closed_at = Utc::now();
        let duration_minutes = (closed_at - session.start_time).num_minutes().max(0);
        entry.total_time_spent_minutes += duration_minutes;
        entry.launch_history.push(LaunchRecord {
            launched_at: session.start_time,
            closed_at,
            duration_minutes,
        });
        entry.active_session = None;
        self.store.save(&mut entry).await?;

        info!(
            "Closed lab for purchase {} after {} minutes ({} steps, {} failed)",
            purchase_id,
            duration_minutes,
            report.steps.len(),
            report.failures().len()
        );

        let message = if snapshot_created {
            "Lab closed; work saved to a snapshot and the namespace kept for relaunch"
        } else {
            "Lab closed without a snapshot; the namespace is kept for relaunch"
        };
        Ok(CloseOutput {
            snapshot_created,
            message: message.to_string(),
            report,
        })
    }

    /// Live status of a lab, read from the fabric
    pub async fn status(&self, purchase_id: &str) -> LaunchResult<LabStatus> {
        let entry = self.load_entry(purchase_id).await?;

        let stopped = LabStatus {
            purchase_id: entry.purchase_id.clone(),
            status: SessionStatus::Stopped,
            instance_name: None,
            address: None,
            session_expires_at: None,
            launch_count: entry.launch_count,
            max_launches: entry.max_launches,
            remaining_launches: entry.remaining_launches(),
        };

        let Some(session) = entry.active_session.as_ref() else {
            return Ok(stopped);
        };

        let view = self.provisioner.runtime_view(&session.namespace).await?;
        if !view.namespace_present {
            // The namespace vanished from under the session. Reporting
            // Stopped lets the next launch start clean.
            return Ok(stopped);
        }

        let (status, instance_name, address) = match view.instance {
            Some(instance) if instance.is_running() => {
                (SessionStatus::Running, Some(instance.name), instance.address)
            }
            Some(instance) => (
                SessionStatus::Provisioning,
                Some(instance.name),
                instance.address,
            ),
            None => (SessionStatus::Provisioning, None, None),
        };

        Ok(LabStatus {
            status,
            instance_name,
            address,
            session_expires_at: Some(session.expires_at),
            ..stopped
        })
    }

    /// Restart the active session's instance through the control plane
    pub async fn restart(&self, purchase_id: &str) -> LaunchResult<()> {
        let _guard = self.entry_lock(purchase_id).await;

        let entry = self.load_entry(purchase_id).await?;
        let session = entry
            .active_session
            .as_ref()
            .ok_or_else(|| LaunchError::NoActiveSession(purchase_id.to_string()))?;

        info!(
            "Restarting instance {} in {}",
            session.instance_name, session.namespace
        );
        self.provisioner
            .restart_instance(&session.namespace, &session.instance_name)
            .await?;
        Ok(())
    }

    /// Destroy every lab whose session expired before `now`.
    ///
    /// Expired sessions were abandoned, so nothing is snapshotted and the
    /// whole namespace goes. Per-entry failures are isolated; one stuck
    /// teardown never stops the sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> LaunchResult<SweepReport> {
        let candidates = self.store.list_with_active_sessions().await?;
        let mut report = SweepReport::default();

        for candidate in candidates {
            let expired = candidate
                .active_session
                .as_ref()
                .is_some_and(|session| session.is_expired(now));
            if !expired {
                continue;
            }
            report.expired += 1;

            match self.destroy_expired(&candidate.purchase_id, now).await {
                Ok(true) => report.destroyed += 1,
                Ok(false) => debug!(
                    "Session for purchase {} changed before the sweep reached it",
                    candidate.purchase_id
                ),
                Err(e) => {
                    warn!("Sweep failed for purchase {}: {}", candidate.purchase_id, e);
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 {
            info!(
                "Expired-session sweep: {} expired, {} destroyed, {} failed",
                report.expired, report.destroyed, report.failed
            );
        }
        Ok(report)
    }

    /// Tear down one expired lab, re-checking under the entry lock.
    /// Returns false when the session was closed or replaced meanwhile.
    async fn destroy_expired(&self, purchase_id: &str, now: DateTime<Utc>) -> LaunchResult<bool> {
        let _guard = self.entry_lock(purchase_id).await;

        let mut entry = self.load_entry(purchase_id).await?;
        let Some(session) = entry.active_session.clone() else {
            return Ok(false);
        };
        if !session.is_expired(now) {
            return Ok(false);
        }

        if let Some(binding) = &session.gateway {
            if let Err(e) = self.gateway.unbind(&binding.username).await {
                warn!("Gateway user {} not removed: {}", binding.username, e);
            }
        }
        self.provisioner.destroy_namespace(&session.namespace).await?;

        // Usage ended at expiry, not when the sweep got around to it.
        let duration_minutes = (session.expires_at - session.start_time)
            .num_minutes()
            .max(0);
        entry.total_time_spent_minutes += duration_minutes;
        entry.launch_history.push(LaunchRecord {
            launched_at: session.start_time,
            closed_at: session.expires_at,
            duration_minutes,
        });
        entry.active_session = None;
        entry.namespace = None;
        entry.snapshot = None;
        self.store.save(&mut entry).await?;

        info!(
            "Destroyed expired lab in {} for purchase {}",
            session.namespace, purchase_id
        );
        Ok(true)
    }

    /// Terminal-entitlement cleanup: destroy any live lab completely and
    /// drop the snapshot reference. The namespace reference survives only
    /// when there was nothing to destroy.
    async fn discard_lab(&self, entry: &mut LabEntry) -> LaunchResult<()> {
        if let Some(session) = entry.active_session.take() {
            warn!(
                "Destroying active lab in {} for purchase {}",
                session.namespace, entry.purchase_id
            );
            if let Some(binding) = &session.gateway {
                if let Err(e) = self.gateway.unbind(&binding.username).await {
                    warn!("Gateway user {} not removed: {}", binding.username, e);
                }
            }
            if let Err(e) = self.provisioner.destroy_namespace(&session.namespace).await {
                warn!("Namespace {} not destroyed: {}", session.namespace, e);
            }
            entry.namespace = None;
        }
        entry.snapshot = None;
        self.store.save(entry).await?;
        Ok(())
    }

    async fn load_entry(&self, purchase_id: &str) -> LaunchResult<LabEntry> {
        self.store
            .get_entry(purchase_id)
            .await?
            .ok_or_else(|| LaunchError::EntitlementMismatch(purchase_id.to_string()))
    }

    /// One lock per purchase id so concurrent operations on the same seat
    /// cannot interleave their read-modify-write cycles.
    async fn entry_lock(&self, purchase_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(purchase_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

fn image_spec(reference: &ImageReference) -> ImageSpec {
    ImageSpec {
        publisher: reference.publisher.clone(),
        offer: reference.offer.clone(),
        sku: reference.sku.clone(),
        version: reference.version.clone(),
    }
}

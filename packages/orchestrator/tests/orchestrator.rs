// ABOUTME: Lifecycle integration tests over a real SQLite store and course catalog
// ABOUTME: Drives launch, close, relaunch, budget exhaustion, and the expiry sweep with mocked fabric seams

use std::sync::Arc;

use chrono::{Duration, Utc};
use mockall::mock;
use pretty_assertions::assert_eq;

use labrack_catalog::{CatalogResult, Course, CourseCatalog, InMemoryCatalog};
use labrack_cloud::{AdminCredentials, SnapshotRecord};
use labrack_directory::{BindingOutcome, DirectoryResult, IdentityProvisioner, LabIdentity};
use labrack_entitlements::{
    EntitlementStore, EntryCreateInput, SessionStatus, SqliteEntitlementStore,
};
use labrack_gateway::{GatewayResult, GatewaySession, RemoteTarget, SessionBinder};
use labrack_orchestrator::{LaunchError, SessionOrchestrator};
use labrack_provisioner::{
    EngineResult, NamespaceHealth, ProvisionRequest, ProvisionedLab, Provisioner, RuntimeView,
    StepOutcome,
};
use labrack_snapshots::{SnapshotResult, Snapshotter};

mock! {
    Prov {}

    #[async_trait::async_trait]
    impl Provisioner for Prov {
        async fn namespace_health(&self, namespace: &str) -> EngineResult<NamespaceHealth>;
        async fn provision(&self, request: &ProvisionRequest) -> EngineResult<ProvisionedLab>;
        async fn teardown_compute(&self, namespace: &str, instance: &str) -> Vec<StepOutcome>;
        async fn destroy_namespace(&self, namespace: &str) -> EngineResult<()>;
        async fn runtime_view(&self, namespace: &str) -> EngineResult<RuntimeView>;
        async fn restart_instance(&self, namespace: &str, instance: &str) -> EngineResult<()>;
    }
}

mock! {
    Snaps {}

    #[async_trait::async_trait]
    impl Snapshotter for Snaps {
        async fn capture(&self, namespace: &str, instance: &str) -> SnapshotResult<SnapshotRecord>;
        async fn latest(&self, namespace: &str) -> SnapshotResult<Option<SnapshotRecord>>;
        async fn rotate(&self, namespace: &str, keep: usize) -> SnapshotResult<usize>;
        async fn remove(&self, namespace: &str, name: &str) -> SnapshotResult<()>;
    }
}

mock! {
    Binder {}

    #[async_trait::async_trait]
    impl SessionBinder for Binder {
        async fn bind(&self, target: &RemoteTarget, lab_id: &str) -> GatewayResult<GatewaySession>;
        async fn unbind(&self, username: &str) -> GatewayResult<()>;
        fn session_url(&self, session: &GatewaySession) -> String;
    }
}

mock! {
    Ids {}

    #[async_trait::async_trait]
    impl IdentityProvisioner for Ids {
        async fn create_identity(&self, owner: &str, course: &str) -> DirectoryResult<LabIdentity>;
        async fn bind_access(&self, identity: &LabIdentity, namespace: &str) -> DirectoryResult<()>;
        async fn remove_bindings(&self, principal_id: &str, namespace: &str) -> Vec<BindingOutcome>;
        async fn delete_identity(&self, username: &str) -> DirectoryResult<()>;
        async fn cleanup_orphans(&self, max_age: chrono::Duration) -> DirectoryResult<usize>;
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![Course {
        id: "course-win".to_string(),
        code: "WS-ADM".to_string(),
        title: "Windows Server Administration".to_string(),
        tags: Vec::new(),
        profile: None,
        requires_elevated_portal: false,
    }])
}

fn admin() -> AdminCredentials {
    AdminCredentials {
        username: "labadmin".to_string(),
        password: "admin-pw".to_string(),
    }
}

fn gateway_session() -> GatewaySession {
    GatewaySession {
        connection_id: "42".to_string(),
        username: "lab-x-y".to_string(),
        password: "gw-pass".to_string(),
        auth_token: "tok".to_string(),
    }
}

fn bind_always(gateway: &mut MockBinder) {
    gateway.expect_bind().returning(|_, _| Ok(gateway_session()));
    gateway
        .expect_session_url()
        .returning(|session| format!("http://gw.example.com/#/client/{}", session.connection_id));
    gateway.expect_unbind().returning(|_| Ok(()));
}

fn orchestrator(
    store: Arc<SqliteEntitlementStore>,
    provisioner: MockProv,
    snapshots: MockSnaps,
    gateway: MockBinder,
    identities: MockIds,
) -> SessionOrchestrator {
    SessionOrchestrator::new(
        store,
        Arc::new(catalog()),
        Arc::new(provisioner),
        Arc::new(snapshots),
        Arc::new(gateway),
        Arc::new(identities),
    )
}

#[tokio::test]
async fn test_launch_close_relaunch_round_trip() {
    let store = Arc::new(SqliteEntitlementStore::in_memory().await.unwrap());
    store.initialize().await.unwrap();
    store
        .create_entry(EntryCreateInput {
            user_id: "user7".to_string(),
            course_id: "course-win".to_string(),
            purchase_id: Some("order-100".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut provisioner = MockProv::new();
    // First launch starts from nothing
    provisioner
        .expect_provision()
        .withf(|request: &ProvisionRequest| {
            !request.reuse_namespace && request.restore_from.is_none()
        })
        .times(1)
        .returning(|request| {
            Ok(ProvisionedLab {
                namespace: request.namespace.clone(),
                instance_name: "vm-ab1cd".to_string(),
                address: Some("20.1.2.3".to_string()),
                admin: admin(),
                restored_from_snapshot: false,
            })
        });
    // Relaunch reuses the namespace and restores the close-time snapshot
    provisioner
        .expect_provision()
        .withf(|request: &ProvisionRequest| {
            request.reuse_namespace
                && request
                    .restore_from
                    .as_ref()
                    .is_some_and(|r| r.snapshot_id.ends_with("snapshot-vm-ab1cd-1"))
        })
        .times(1)
        .returning(|request| {
            Ok(ProvisionedLab {
                namespace: request.namespace.clone(),
                instance_name: "vm-ef2gh".to_string(),
                address: Some("20.1.2.9".to_string()),
                admin: admin(),
                restored_from_snapshot: true,
            })
        });
    provisioner
        .expect_namespace_health()
        .times(1)
        .returning(|_| Ok(NamespaceHealth::Reusable));
    provisioner.expect_teardown_compute().times(1).returning(|_, _| {
        vec![
            StepOutcome::succeeded("instance"),
            StepOutcome::succeeded("interface"),
            StepOutcome::succeeded("address"),
            StepOutcome::succeeded("security-group"),
            StepOutcome::succeeded("disk"),
        ]
    });
    provisioner.expect_destroy_namespace().never();

    let mut snapshots = MockSnaps::new();
    snapshots
        .expect_capture()
        .withf(|ns, instance| ns.starts_with("lab-user7-ws-adm-") && instance == "vm-ab1cd")
        .times(1)
        .returning(|ns, instance| {
            Ok(SnapshotRecord {
                id: format!("{}/snapshots/snapshot-{}-1", ns, instance),
                name: format!("snapshot-{}-1", instance),
                created_at: Utc::now(),
            })
        });
    snapshots.expect_rotate().times(1).returning(|_, _| Ok(0));

    let mut gateway = MockBinder::new();
    bind_always(&mut gateway);

    let orchestrator = orchestrator(
        store.clone(),
        provisioner,
        snapshots,
        gateway,
        MockIds::new(),
    );

    let first = orchestrator
        .launch("user7", "course-win", "order-100")
        .await
        .unwrap();
    assert_eq!(first.launch_count, 1);
    assert!(!first.reused_namespace);
    assert!(!first.restored_from_snapshot);
    assert_eq!(first.session.status, SessionStatus::Running);
    assert!(first
        .connection_url
        .as_deref()
        .is_some_and(|url| url.contains("/#/client/42")));

    let closed = orchestrator.close("order-100").await.unwrap();
    assert!(closed.snapshot_created);
    assert!(closed.report.all_ok());

    let after_close = store.get_entry("order-100").await.unwrap().unwrap();
    assert!(after_close.active_session.is_none());
    assert!(after_close.namespace.is_some());
    assert_eq!(
        after_close.snapshot.as_ref().unwrap().name,
        "snapshot-vm-ab1cd-1"
    );
    assert_eq!(after_close.launch_history.len(), 1);

    let second = orchestrator
        .launch("user7", "course-win", "order-100")
        .await
        .unwrap();
    assert_eq!(second.launch_count, 2);
    assert!(second.reused_namespace);
    assert!(second.restored_from_snapshot);
    assert_eq!(second.session.namespace, first.session.namespace);
    assert_eq!(second.session.instance_name, "vm-ef2gh");
    assert_eq!(second.remaining_launches, 8);
}

#[tokio::test]
async fn test_launch_budget_runs_out() {
    let store = Arc::new(SqliteEntitlementStore::in_memory().await.unwrap());
    store.initialize().await.unwrap();
    store
        .create_entry(EntryCreateInput {
            user_id: "user7".to_string(),
            course_id: "course-win".to_string(),
            purchase_id: Some("order-200".to_string()),
            max_launches: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut provisioner = MockProv::new();
    provisioner.expect_provision().times(2).returning(|request| {
        Ok(ProvisionedLab {
            namespace: request.namespace.clone(),
            instance_name: "vm-ab1cd".to_string(),
            address: Some("20.1.2.3".to_string()),
            admin: admin(),
            restored_from_snapshot: request.restore_from.is_some(),
        })
    });
    provisioner
        .expect_namespace_health()
        .returning(|_| Ok(NamespaceHealth::Reusable));
    provisioner
        .expect_teardown_compute()
        .times(2)
        .returning(|_, _| vec![StepOutcome::succeeded("instance")]);
    // Nothing is live at the third attempt, so nothing is destroyed
    provisioner.expect_destroy_namespace().never();

    let mut snapshots = MockSnaps::new();
    snapshots.expect_capture().times(2).returning(|ns, instance| {
        Ok(SnapshotRecord {
            id: format!("{}/snapshots/snapshot-{}-1", ns, instance),
            name: format!("snapshot-{}-1", instance),
            created_at: Utc::now(),
        })
    });
    snapshots.expect_rotate().returning(|_, _| Ok(0));

    let mut gateway = MockBinder::new();
    bind_always(&mut gateway);

    let orchestrator = orchestrator(
        store.clone(),
        provisioner,
        snapshots,
        gateway,
        MockIds::new(),
    );

    for _ in 0..2 {
        orchestrator
            .launch("user7", "course-win", "order-200")
            .await
            .unwrap();
        orchestrator.close("order-200").await.unwrap();
    }

    let err = orchestrator
        .launch("user7", "course-win", "order-200")
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::LaunchLimitReached(2)));
    assert!(err.is_terminal());

    // The snapshot goes with the dead entitlement; the namespace record
    // stays because there was no live lab to destroy.
    let spent = store.get_entry("order-200").await.unwrap().unwrap();
    assert_eq!(spent.launch_count, 2);
    assert_eq!(spent.remaining_launches(), 0);
    assert!(spent.snapshot.is_none());
    assert!(spent.namespace.is_some());
    assert!(spent.active_session.is_none());
    assert_eq!(spent.launch_history.len(), 2);
}

#[tokio::test]
async fn test_sweep_destroys_expired_labs_and_accrues_usage() {
    let store = Arc::new(SqliteEntitlementStore::in_memory().await.unwrap());
    store.initialize().await.unwrap();
    store
        .create_entry(EntryCreateInput {
            user_id: "user7".to_string(),
            course_id: "course-win".to_string(),
            purchase_id: Some("order-300".to_string()),
            session_duration_hours: Some(4),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .create_entry(EntryCreateInput {
            user_id: "user8".to_string(),
            course_id: "course-win".to_string(),
            purchase_id: Some("order-301".to_string()),
            session_duration_hours: Some(8),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut provisioner = MockProv::new();
    provisioner.expect_provision().times(2).returning(|request| {
        Ok(ProvisionedLab {
            namespace: request.namespace.clone(),
            instance_name: "vm-ab1cd".to_string(),
            address: Some("20.1.2.3".to_string()),
            admin: admin(),
            restored_from_snapshot: false,
        })
    });
    // Only the 4 hour session is past expiry at sweep time
    provisioner
        .expect_destroy_namespace()
        .withf(|ns: &str| ns.starts_with("lab-user7-ws-adm-"))
        .times(1)
        .returning(|_| Ok(()));

    let mut gateway = MockBinder::new();
    bind_always(&mut gateway);

    let orchestrator = orchestrator(
        store.clone(),
        provisioner,
        MockSnaps::new(),
        gateway,
        MockIds::new(),
    );

    orchestrator
        .launch("user7", "course-win", "order-300")
        .await
        .unwrap();
    orchestrator
        .launch("user8", "course-win", "order-301")
        .await
        .unwrap();

    let report = orchestrator
        .sweep_expired(Utc::now() + Duration::hours(5))
        .await
        .unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.destroyed, 1);
    assert_eq!(report.failed, 0);

    let swept = store.get_entry("order-300").await.unwrap().unwrap();
    assert!(swept.active_session.is_none());
    assert!(swept.namespace.is_none());
    assert!(swept.snapshot.is_none());
    assert_eq!(swept.launch_history.len(), 1);
    assert_eq!(swept.total_time_spent_minutes, 4 * 60);

    let untouched = store.get_entry("order-301").await.unwrap().unwrap();
    assert!(untouched.active_session.is_some());
    assert!(untouched.namespace.is_some());
}

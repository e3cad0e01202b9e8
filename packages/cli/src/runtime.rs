// ABOUTME: Builds the live service stack behind the CLI commands
// ABOUTME: Wires fabric, provisioner, snapshots, gateway, directory, store, and catalog into one orchestrator

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use labrack_catalog::InMemoryCatalog;
use labrack_cloud::{ComputeFabric, FabricConfig, HttpFabric};
use labrack_directory::{DirectoryApi, DirectoryConfig, HttpDirectory, IdentityConfig, IdentityManager};
use labrack_entitlements::SqliteEntitlementStore;
use labrack_gateway::{GatewayClient, GatewayConfig};
use labrack_orchestrator::SessionOrchestrator;
use labrack_provisioner::{Engine, EngineConfig};
use labrack_snapshots::SnapshotManager;

use crate::config::CliConfig;

/// Live services the CLI commands run against.
///
/// The store and identity manager are exposed directly for the commands
/// that bypass the orchestrator (seat management, orphan cleanup).
pub struct Runtime {
    pub store: Arc<SqliteEntitlementStore>,
    pub identities: Arc<IdentityManager>,
    pub orchestrator: SessionOrchestrator,
}

impl Runtime {
    pub async fn build(config: &CliConfig) -> anyhow::Result<Self> {
        let fabric: Arc<dyn ComputeFabric> = Arc::new(
            HttpFabric::new(FabricConfig::new(&config.fabric_url, &config.fabric_token))
                .context("building the fabric client")?,
        );

        let engine = Arc::new(Engine::new(
            fabric.clone(),
            EngineConfig::new(&config.region, &config.admin_password),
        ));
        let snapshots = Arc::new(SnapshotManager::new(fabric.clone()));

        let gateway = Arc::new(
            GatewayClient::new(GatewayConfig::new(
                &config.gateway_url,
                &config.gateway_username,
                &config.gateway_password,
            ))
            .context("building the gateway client")?,
        );

        let directory: Arc<dyn DirectoryApi> = Arc::new(
            HttpDirectory::new(DirectoryConfig::new(
                &config.directory_url,
                &config.directory_token,
            ))
            .context("building the directory client")?,
        );
        let identities = Arc::new(IdentityManager::new(
            directory,
            IdentityConfig::new(
                &config.identity_domain,
                &config.lab_role_id,
                &config.lab_policy_id,
            ),
        ));

        let store = Arc::new(
            SqliteEntitlementStore::new(&config.database_path)
                .await
                .with_context(|| {
                    format!(
                        "opening the entitlement store at {}",
                        config.database_path.display()
                    )
                })?,
        );
        store
            .initialize()
            .await
            .context("preparing the entitlement schema")?;

        let catalog = if config.courses_path.exists() {
            let catalog =
                InMemoryCatalog::from_json_file(&config.courses_path).with_context(|| {
                    format!("loading courses from {}", config.courses_path.display())
                })?;
            info!(
                "Loaded {} courses from {}",
                catalog.len(),
                config.courses_path.display()
            );
            catalog
        } else {
            warn!(
                "No course file at {}; the catalog is empty",
                config.courses_path.display()
            );
            InMemoryCatalog::new(Vec::new())
        };

        let orchestrator = SessionOrchestrator::new(
            store.clone(),
            Arc::new(catalog),
            engine,
            snapshots,
            gateway,
            identities.clone(),
        )
        .with_snapshot_retention(config.snapshot_retention);

        Ok(Self {
            store,
            identities,
            orchestrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labrack_entitlements::EntitlementStore;
    use std::path::PathBuf;

    fn config_in(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            database_path: dir.join("labrack.db"),
            courses_path: dir.join("courses.json"),
            fabric_url: "https://fabric.example.com".to_string(),
            fabric_token: "fabric-token".to_string(),
            region: "eastus".to_string(),
            admin_password: "Adm1nPass!".to_string(),
            gateway_url: "https://gateway.example.com".to_string(),
            gateway_username: "gw-admin".to_string(),
            gateway_password: "gw-pass".to_string(),
            directory_url: "https://directory.example.com".to_string(),
            directory_token: "dir-token".to_string(),
            identity_domain: "labs.example.com".to_string(),
            lab_role_id: "role-1".to_string(),
            lab_policy_id: "policy-1".to_string(),
            snapshot_retention: 1,
        }
    }

    #[tokio::test]
    async fn test_build_creates_store_and_tolerates_missing_courses() {
        let dir = tempfile::tempdir().unwrap();

        let runtime = Runtime::build(&config_in(dir.path())).await.unwrap();

        assert!(dir.path().join("labrack.db").exists());
        let entries = runtime.store.list_entries("nobody").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_build_loads_course_file() {
        let dir = tempfile::tempdir().unwrap();
        let courses = dir.path().join("courses.json");
        std::fs::write(
            &courses,
            r#"[{"id": "course-1", "code": "WS", "title": "Server Basics"}]"#,
        )
        .unwrap();
        let mut config = config_in(dir.path());
        config.courses_path = PathBuf::from(&courses);

        let runtime = Runtime::build(&config).await.unwrap();

        let status = runtime.orchestrator.status("missing").await;
        assert!(status.is_err());
    }
}

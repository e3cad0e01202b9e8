use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{CloudError, CloudResult};
use crate::fabric::ComputeFabric;
use crate::types::{
    DiskSpec, InstanceSpec, InstanceView, InterfaceSpec, NamespaceInfo, NetworkInfo, NetworkSpec,
    PublicAddress, ResourceRef, SecurityGroupSpec, SnapshotRecord, SnapshotSpec,
};

const OPERATION_LOCATION: &str = "operation-location";

/// Connection settings for the fabric control plane
#[derive(Clone)]
pub struct FabricConfig {
    pub base_url: String,
    pub token: String,
    pub operation_poll_interval: Duration,
    pub operation_poll_attempts: u32,
}

impl FabricConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            operation_poll_interval: Duration::from_secs(2),
            operation_poll_attempts: 60,
        }
    }
}

impl std::fmt::Debug for FabricConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("operation_poll_interval", &self.operation_poll_interval)
            .field("operation_poll_attempts", &self.operation_poll_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OperationStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Deserialize)]
struct OperationState {
    status: OperationStatus,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct NamespaceBody<'a> {
    region: &'a str,
}

#[derive(Serialize)]
struct AddressBody<'a> {
    allocation: &'a str,
    sku: &'a str,
}

/// HTTP client for the compute-fabric control plane
pub struct HttpFabric {
    client: Client,
    config: FabricConfig,
}

impl HttpFabric {
    pub fn new(config: FabricConfig) -> CloudResult<Self> {
        if config.base_url.is_empty() {
            return Err(CloudError::Configuration(
                "Fabric base URL is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CloudError::network)?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.token)
    }

    async fn error_for(&self, what: &str, response: Response) -> CloudError {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => CloudError::NotFound(what.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Authentication(
                format!("Fabric rejected credentials while accessing {}", what),
            ),
            StatusCode::CONFLICT => CloudError::Conflict(what.to_string()),
            _ => {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                CloudError::api(status.as_u16(), message)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, what: &str, path: &str) -> CloudResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(CloudError::network)?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| CloudError::InvalidResponse(e.to_string()))
        } else {
            Err(self.error_for(what, response).await)
        }
    }

    /// PUT a resource, wait out any long-running operation, and return the
    /// fabric's final view of it.
    async fn put_and_fetch<B: Serialize, T: DeserializeOwned>(
        &self,
        what: &str,
        path: &str,
        body: &B,
    ) -> CloudResult<T> {
        let response = self
            .client
            .put(self.url(path))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(CloudError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => response
                .json::<T>()
                .await
                .map_err(|e| CloudError::InvalidResponse(e.to_string())),
            StatusCode::ACCEPTED => {
                let operation = self.operation_url(&response)?;
                self.wait_for_operation(&operation).await?;
                self.get_json(what, path).await
            }
            _ => Err(self.error_for(what, response).await),
        }
    }

    /// PUT a resource and return as soon as the fabric accepts the request
    async fn put_accepted<B: Serialize>(&self, what: &str, path: &str, body: &B) -> CloudResult<()> {
        let response = self
            .client
            .put(self.url(path))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(CloudError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(()),
            _ => Err(self.error_for(what, response).await),
        }
    }

    async fn delete(&self, what: &str, path: &str, wait: bool) -> CloudResult<()> {
        let response = self
            .client
            .delete(self.url(path))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(CloudError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::ACCEPTED => {
                if wait {
                    let operation = self.operation_url(&response)?;
                    self.wait_for_operation(&operation).await
                } else {
                    Ok(())
                }
            }
            _ => Err(self.error_for(what, response).await),
        }
    }

    async fn post_action(&self, what: &str, path: &str, wait: bool) -> CloudResult<()> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(CloudError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::ACCEPTED => {
                if wait {
                    let operation = self.operation_url(&response)?;
                    self.wait_for_operation(&operation).await
                } else {
                    Ok(())
                }
            }
            _ => Err(self.error_for(what, response).await),
        }
    }

    fn operation_url(&self, response: &Response) -> CloudResult<String> {
        response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .ok_or_else(|| {
                CloudError::InvalidResponse(
                    "Accepted response carried no operation-location header".to_string(),
                )
            })
    }

    async fn wait_for_operation(&self, operation: &str) -> CloudResult<()> {
        for attempt in 0..self.config.operation_poll_attempts {
            let response = self
                .client
                .get(operation)
                .header("Authorization", self.auth_header())
                .send()
                .await
                .map_err(CloudError::network)?;

            if !response.status().is_success() {
                return Err(self.error_for("operation", response).await);
            }

            let state: OperationState = response
                .json()
                .await
                .map_err(|e| CloudError::InvalidResponse(e.to_string()))?;

            match state.status {
                OperationStatus::Succeeded => return Ok(()),
                OperationStatus::Failed | OperationStatus::Canceled => {
                    return Err(CloudError::OperationFailed(
                        state
                            .error
                            .unwrap_or_else(|| "fabric reported no failure detail".to_string()),
                    ));
                }
                OperationStatus::Pending | OperationStatus::Running => {
                    debug!(
                        "Operation still running (poll {}/{}): {}",
                        attempt + 1,
                        self.config.operation_poll_attempts,
                        operation
                    );
                    tokio::time::sleep(self.config.operation_poll_interval).await;
                }
            }
        }

        Err(CloudError::OperationTimeout {
            operation: operation.to_string(),
            attempts: self.config.operation_poll_attempts,
        })
    }
}

#[async_trait]
impl ComputeFabric for HttpFabric {
    async fn register_capability(&self, name: &str) -> CloudResult<()> {
        self.post_action(name, &format!("capabilities/{}/register", name), false)
            .await
    }

    async fn get_namespace(&self, namespace: &str) -> CloudResult<Option<NamespaceInfo>> {
        let path = format!("namespaces/{}", namespace);
        match self.get_json::<NamespaceInfo>(namespace, &path).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_namespace(&self, namespace: &str, region: &str) -> CloudResult<()> {
        debug!("Creating namespace {} in {}", namespace, region);
        self.put_accepted(
            namespace,
            &format!("namespaces/{}", namespace),
            &NamespaceBody { region },
        )
        .await
    }

    async fn delete_namespace(&self, namespace: &str) -> CloudResult<()> {
        debug!("Requesting deletion of namespace {}", namespace);
        self.delete(namespace, &format!("namespaces/{}", namespace), false)
            .await
    }

    async fn create_network(
        &self,
        namespace: &str,
        spec: &NetworkSpec,
    ) -> CloudResult<ResourceRef> {
        let path = format!("namespaces/{}/networks/{}", namespace, spec.name);
        let info: NetworkInfo = self.put_and_fetch(&spec.name, &path, spec).await?;
        Ok(info.subnet)
    }

    async fn create_public_address(
        &self,
        namespace: &str,
        name: &str,
    ) -> CloudResult<ResourceRef> {
        let path = format!("namespaces/{}/addresses/{}", namespace, name);
        let body = AddressBody {
            allocation: "static",
            sku: "standard",
        };
        let address: PublicAddress = self.put_and_fetch(name, &path, &body).await?;
        Ok(ResourceRef {
            id: address.id,
            name: address.name,
        })
    }

    async fn get_public_address(&self, namespace: &str, name: &str) -> CloudResult<PublicAddress> {
        let path = format!("namespaces/{}/addresses/{}", namespace, name);
        self.get_json(name, &path).await
    }

    async fn delete_public_address(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/addresses/{}", namespace, name);
        self.delete(name, &path, true).await
    }

    async fn create_security_group(
        &self,
        namespace: &str,
        spec: &SecurityGroupSpec,
    ) -> CloudResult<ResourceRef> {
        let path = format!("namespaces/{}/security-groups/{}", namespace, spec.name);
        self.put_and_fetch(&spec.name, &path, spec).await
    }

    async fn delete_security_group(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/security-groups/{}", namespace, name);
        self.delete(name, &path, true).await
    }

    async fn create_interface(
        &self,
        namespace: &str,
        spec: &InterfaceSpec,
    ) -> CloudResult<ResourceRef> {
        let path = format!("namespaces/{}/interfaces/{}", namespace, spec.name);
        self.put_and_fetch(&spec.name, &path, spec).await
    }

    async fn delete_interface(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/interfaces/{}", namespace, name);
        self.delete(name, &path, true).await
    }

    async fn create_instance(&self, namespace: &str, spec: &InstanceSpec) -> CloudResult<()> {
        debug!("Submitting instance {} in namespace {}", spec.name, namespace);
        let path = format!("namespaces/{}/instances/{}", namespace, spec.name);
        self.put_accepted(&spec.name, &path, spec).await
    }

    async fn get_instance(&self, namespace: &str, name: &str) -> CloudResult<InstanceView> {
        let path = format!("namespaces/{}/instances/{}", namespace, name);
        self.get_json(name, &path).await
    }

    async fn list_instances(&self, namespace: &str) -> CloudResult<Vec<InstanceView>> {
        let path = format!("namespaces/{}/instances", namespace);
        self.get_json(namespace, &path).await
    }

    async fn delete_instance(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/instances/{}", namespace, name);
        self.delete(name, &path, true).await
    }

    async fn restart_instance(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/instances/{}/restart", namespace, name);
        self.post_action(name, &path, false).await
    }

    async fn deallocate_instance(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/instances/{}/deallocate", namespace, name);
        self.post_action(name, &path, true).await
    }

    async fn create_disk_from_snapshot(
        &self,
        namespace: &str,
        spec: &DiskSpec,
    ) -> CloudResult<ResourceRef> {
        let path = format!("namespaces/{}/disks/{}", namespace, spec.name);
        self.put_and_fetch(&spec.name, &path, spec).await
    }

    async fn delete_disk(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/disks/{}", namespace, name);
        self.delete(name, &path, true).await
    }

    async fn create_snapshot(
        &self,
        namespace: &str,
        spec: &SnapshotSpec,
    ) -> CloudResult<SnapshotRecord> {
        let path = format!("namespaces/{}/snapshots/{}", namespace, spec.name);
        self.put_and_fetch(&spec.name, &path, spec).await
    }

    async fn list_snapshots(&self, namespace: &str) -> CloudResult<Vec<SnapshotRecord>> {
        let path = format!("namespaces/{}/snapshots", namespace);
        self.get_json(namespace, &path).await
    }

    async fn delete_snapshot(&self, namespace: &str, name: &str) -> CloudResult<()> {
        let path = format!("namespaces/{}/snapshots/{}", namespace, name);
        self.delete(name, &path, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_trims_trailing_slash() {
        let fabric = HttpFabric::new(FabricConfig::new("https://fabric.test/", "tok")).unwrap();
        assert_eq!(
            fabric.url("namespaces/lab-x"),
            "https://fabric.test/v1/namespaces/lab-x"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpFabric::new(FabricConfig::new("", "tok"));
        assert!(matches!(result, Err(CloudError::Configuration(_))));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = FabricConfig::new("https://fabric.test", "super-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}

//! HTTP implementation of the directory API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::DirectoryApi;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{DirectoryUser, RoleAssignment, UserSpec};

/// Connection settings for the directory service
#[derive(Clone)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub token: String,
}

impl DirectoryConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct CreatedUser {
    id: String,
}

#[derive(Serialize)]
struct RoleAssignmentBody<'a> {
    principal_id: &'a str,
    role_id: &'a str,
}

#[derive(Serialize)]
struct PolicyAssignmentBody<'a> {
    policy_id: &'a str,
    display_name: &'a str,
    description: &'a str,
}

/// HTTP client for the identity directory
pub struct HttpDirectory {
    client: Client,
    config: DirectoryConfig,
}

impl HttpDirectory {
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        if config.base_url.is_empty() {
            return Err(DirectoryError::Configuration(
                "Directory base URL is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(DirectoryError::network)?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.token)
    }

    async fn error_for(&self, what: &str, response: Response) -> DirectoryError {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => DirectoryError::NotFound(what.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectoryError::Authentication(
                format!("Directory rejected credentials while accessing {}", what),
            ),
            _ => {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                DirectoryError::api(status.as_u16(), message)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        request: reqwest::RequestBuilder,
    ) -> DirectoryResult<T> {
        let response = request
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(DirectoryError::network)?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
        } else {
            Err(self.error_for(what, response).await)
        }
    }

    async fn put_json<B: Serialize>(&self, what: &str, path: &str, body: &B) -> DirectoryResult<()> {
        let response = self
            .client
            .put(self.url(path))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(DirectoryError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(self.error_for(what, response).await),
        }
    }

    async fn delete(&self, what: &str, path: &str) -> DirectoryResult<()> {
        let response = self
            .client
            .delete(self.url(path))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(DirectoryError::network)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(self.error_for(what, response).await),
        }
    }
}

#[async_trait]
impl DirectoryApi for HttpDirectory {
    async fn create_user(&self, spec: &UserSpec) -> DirectoryResult<String> {
        let response = self
            .client
            .post(self.url("users"))
            .header("Authorization", self.auth_header())
            .json(spec)
            .send()
            .await
            .map_err(DirectoryError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for("user creation", response).await);
        }

        let created: CreatedUser = response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
        debug!("Directory user {} created as {}", spec.username, created.id);
        Ok(created.id)
    }

    async fn get_user(&self, username: &str) -> DirectoryResult<Option<DirectoryUser>> {
        let request = self.client.get(self.url(&format!("users/{}", username)));
        match self.get_json::<DirectoryUser>(username, request).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_users(&self, prefix: &str) -> DirectoryResult<Vec<DirectoryUser>> {
        let request = self
            .client
            .get(self.url("users"))
            .query(&[("prefix", prefix)]);
        self.get_json("user listing", request).await
    }

    async fn delete_user(&self, username: &str) -> DirectoryResult<()> {
        self.delete(username, &format!("users/{}", username)).await
    }

    async fn assign_role(
        &self,
        scope: &str,
        assignment_id: &str,
        principal_id: &str,
        role_id: &str,
    ) -> DirectoryResult<()> {
        let body = RoleAssignmentBody {
            principal_id,
            role_id,
        };
        self.put_json(
            "role assignment",
            &format!("scopes/{}/role-assignments/{}", scope, assignment_id),
            &body,
        )
        .await
    }

    async fn list_role_assignments(&self, scope: &str) -> DirectoryResult<Vec<RoleAssignment>> {
        let request = self
            .client
            .get(self.url(&format!("scopes/{}/role-assignments", scope)));
        self.get_json("role assignment listing", request).await
    }

    async fn delete_role_assignment(
        &self,
        scope: &str,
        assignment_id: &str,
    ) -> DirectoryResult<()> {
        self.delete(
            assignment_id,
            &format!("scopes/{}/role-assignments/{}", scope, assignment_id),
        )
        .await
    }

    async fn assign_policy(
        &self,
        scope: &str,
        name: &str,
        policy_id: &str,
    ) -> DirectoryResult<()> {
        let body = PolicyAssignmentBody {
            policy_id,
            display_name: "Lab Guardrails",
            description: "Guardrail policies for lab namespaces",
        };
        self.put_json(
            "policy assignment",
            &format!("scopes/{}/policy-assignments/{}", scope, name),
            &body,
        )
        .await
    }

    async fn delete_policy_assignment(&self, scope: &str, name: &str) -> DirectoryResult<()> {
        self.delete(name, &format!("scopes/{}/policy-assignments/{}", scope, name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_joins_without_double_slash() {
        let directory = HttpDirectory::new(DirectoryConfig::new(
            "https://directory.example.com/",
            "token",
        ))
        .unwrap();
        assert_eq!(
            directory.url("users/lab-user-1"),
            "https://directory.example.com/v1/users/lab-user-1"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpDirectory::new(DirectoryConfig::new("", "token"));
        assert!(matches!(result, Err(DirectoryError::Configuration(_))));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = DirectoryConfig::new("https://directory.example.com", "super-secret");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("directory.example.com"));
        assert!(!rendered.contains("super-secret"));
    }
}

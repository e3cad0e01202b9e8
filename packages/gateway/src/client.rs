//! HTTP client for the web remote-access gateway
//!
//! The gateway exposes a JSON admin API. Authenticating posts credentials
//! and yields a token that rides along as a query parameter on every later
//! call. Binding a lab creates a connection that tunnels RDP to the
//! instance, a throwaway user, and a grant tying the two together.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::types::{GatewaySession, RemoteTarget};

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// RDP port inside the instance; the gateway dials this directly
const RDP_PORT: &str = "3389";

/// Gateway endpoint and admin credentials
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Identity backend the gateway stores users and connections in
    pub data_source: String,
}

impl GatewayConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            data_source: "mysql".to_string(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("data_source", &self.data_source)
            .finish()
    }
}

/// Seam between the orchestrator and the gateway
#[async_trait]
pub trait SessionBinder: Send + Sync {
    /// Create the connection, user, and grant for one lab session
    async fn bind(&self, target: &RemoteTarget, lab_id: &str) -> GatewayResult<GatewaySession>;

    /// Remove the session user; idempotent
    async fn unbind(&self, username: &str) -> GatewayResult<()>;

    /// Browser URL that opens the session pre-authenticated
    fn session_url(&self, session: &GatewaySession) -> String;
}

pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
    /// Cached admin token; dropped when the gateway rejects it
    token: RwLock<Option<String>>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "Gateway base URL is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(GatewayError::network)?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn data_path(&self, rest: &str) -> String {
        format!("session/data/{}/{}", self.config.data_source, rest)
    }

    async fn error_for(&self, what: &str, response: reqwest::Response) -> GatewayError {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound(what.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // The cached token may have expired; the next call re-authenticates
                *self.token.write().await = None;
                GatewayError::Authentication(format!("{} rejected with {}", what, status))
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| status.to_string());
                GatewayError::api(status.as_u16(), message)
            }
        }
    }

    /// Exchange credentials for an API token
    async fn authenticate(&self, username: &str, password: &str) -> GatewayResult<String> {
        let response = self
            .client
            .post(self.api_url("tokens"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(GatewayError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for("token request", response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(token.auth_token)
    }

    async fn admin_token(&self) -> GatewayResult<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let token = self
            .authenticate(&self.config.username, &self.config.password)
            .await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn create_connection(
        &self,
        token: &str,
        target: &RemoteTarget,
        lab_id: &str,
    ) -> GatewayResult<String> {
        let body = ConnectionBody {
            parent_identifier: "ROOT",
            name: format!("Lab-{}-{}", lab_id, Utc::now().timestamp_millis()),
            protocol: "rdp",
            parameters: ConnectionParameters {
                hostname: &target.address,
                port: RDP_PORT,
                username: &target.username,
                password: &target.password,
                ignore_cert: "true",
                security: "any",
                // Drive redirection gives the session a persistent virtual drive
                enable_drive: "true",
                create_drive_path: "true",
            },
            attributes: ConnectionAttributes {
                max_connections: "5",
                max_connections_per_user: "1",
            },
        };

        let response = self
            .client
            .post(self.api_url(&self.data_path("connections")))
            .query(&[("token", token)])
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for("connection registration", response).await);
        }

        let created: ConnectionCreated = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!(
            "Gateway connection {} registered for lab {}",
            created.identifier, lab_id
        );
        Ok(created.identifier)
    }

    async fn create_user(&self, token: &str, username: &str, password: &str) -> GatewayResult<()> {
        let body = UserBody {
            username,
            password,
            attributes: UserAttributes::unrestricted(),
        };

        let response = self
            .client
            .post(self.api_url(&self.data_path("users")))
            .query(&[("token", token)])
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for("user creation", response).await);
        }
        Ok(())
    }

    async fn grant_connection(
        &self,
        token: &str,
        username: &str,
        connection_id: &str,
    ) -> GatewayResult<()> {
        let patch = [PermissionOp {
            op: "add",
            path: format!("/connectionPermissions/{}", connection_id),
            value: "READ",
        }];

        let response = self
            .client
            .patch(self.api_url(&self.data_path(&format!("users/{}/permissions", username))))
            .query(&[("token", token)])
            .json(&patch)
            .send()
            .await
            .map_err(GatewayError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for("permission grant", response).await);
        }
        Ok(())
    }

    async fn delete_user(&self, token: &str, username: &str) -> GatewayResult<()> {
        let response = self
            .client
            .delete(self.api_url(&self.data_path(&format!("users/{}", username))))
            .query(&[("token", token)])
            .send()
            .await
            .map_err(GatewayError::network)?;

        if !response.status().is_success() {
            return Err(self.error_for(username, response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionBinder for GatewayClient {
    async fn bind(&self, target: &RemoteTarget, lab_id: &str) -> GatewayResult<GatewaySession> {
        let token = self.admin_token().await?;
        let connection_id = self.create_connection(&token, target, lab_id).await?;

        let username = session_username();
        let password = session_password();
        self.create_user(&token, &username, &password).await?;
        self.grant_connection(&token, &username, &connection_id)
            .await?;

        // The browser authenticates as the throwaway user, not as admin
        let auth_token = self.authenticate(&username, &password).await?;
        info!(
            "Bound gateway session {} to connection {}",
            username, connection_id
        );

        Ok(GatewaySession {
            connection_id,
            username,
            password,
            auth_token,
        })
    }

    async fn unbind(&self, username: &str) -> GatewayResult<()> {
        let token = self.admin_token().await?;
        match self.delete_user(&token, username).await {
            Ok(()) => {
                info!("Removed gateway user {}", username);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Gateway user {} already absent", username);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn session_url(&self, session: &GatewaySession) -> String {
        format!(
            "{}/#/client/{}?username={}&password={}",
            self.config.base_url.trim_end_matches('/'),
            session.connection_id,
            session.username,
            session.password
        )
    }
}

/// Unique low-privilege username, sortable by creation time
fn session_username() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    format!("lab-{}-{}", to_base36(millis), random_base36(4))
}

fn session_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
        .collect()
}

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.into_iter().rev().collect()
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "authToken")]
    auth_token: String,
}

#[derive(Deserialize)]
struct ConnectionCreated {
    identifier: String,
}

#[derive(Serialize)]
struct ConnectionBody<'a> {
    #[serde(rename = "parentIdentifier")]
    parent_identifier: &'a str,
    name: String,
    protocol: &'a str,
    parameters: ConnectionParameters<'a>,
    attributes: ConnectionAttributes<'a>,
}

#[derive(Serialize)]
struct ConnectionParameters<'a> {
    hostname: &'a str,
    port: &'a str,
    username: &'a str,
    password: &'a str,
    #[serde(rename = "ignore-cert")]
    ignore_cert: &'a str,
    security: &'a str,
    #[serde(rename = "enable-drive")]
    enable_drive: &'a str,
    #[serde(rename = "create-drive-path")]
    create_drive_path: &'a str,
}

#[derive(Serialize)]
struct ConnectionAttributes<'a> {
    #[serde(rename = "max-connections")]
    max_connections: &'a str,
    #[serde(rename = "max-connections-per-user")]
    max_connections_per_user: &'a str,
}

#[derive(Serialize)]
struct UserBody<'a> {
    username: &'a str,
    password: &'a str,
    attributes: UserAttributes<'a>,
}

#[derive(Serialize)]
struct UserAttributes<'a> {
    disabled: &'a str,
    expired: &'a str,
    #[serde(rename = "access-window-start")]
    access_window_start: &'a str,
    #[serde(rename = "access-window-end")]
    access_window_end: &'a str,
    #[serde(rename = "valid-from")]
    valid_from: &'a str,
    #[serde(rename = "valid-until")]
    valid_until: &'a str,
    timezone: Option<&'a str>,
}

impl<'a> UserAttributes<'a> {
    /// Empty values mean no login-window or expiry restrictions
    fn unrestricted() -> Self {
        Self {
            disabled: "",
            expired: "",
            access_window_start: "",
            access_window_end: "",
            valid_from: "",
            valid_until: "",
            timezone: None,
        }
    }
}

#[derive(Serialize)]
struct PermissionOp<'a> {
    op: &'a str,
    path: String,
    value: &'a str,
}

//! Public types for gateway session bindings

use serde::{Deserialize, Serialize};

/// Instance the gateway should tunnel RDP traffic to
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    /// Public address of the instance
    pub address: String,
    /// Administrator account inside the instance
    pub username: String,
    pub password: String,
}

/// One live browser session binding: a throwaway gateway user granted
/// access to exactly one connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub connection_id: String,
    pub username: String,
    pub password: String,
    pub auth_token: String,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("connection_id", &self.connection_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_session_secrets() {
        let session = GatewaySession {
            connection_id: "42".to_string(),
            username: "lab-abc-defg".to_string(),
            password: "s3cr3tpass123".to_string(),
            auth_token: "tok-xyz".to_string(),
        };
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("lab-abc-defg"));
        assert!(!rendered.contains("s3cr3tpass123"));
        assert!(!rendered.contains("tok-xyz"));
    }
}

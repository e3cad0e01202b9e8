//! Wire and domain types for the identity directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload for creating a directory user
#[derive(Clone, Serialize)]
pub struct UserSpec {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub account_enabled: bool,
    pub force_password_change: bool,
    pub labels: UserLabels,
}

/// Ownership markers so orphaned accounts can be traced back
#[derive(Debug, Clone, Serialize)]
pub struct UserLabels {
    pub lab: String,
    pub owner: String,
}

impl std::fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("password", &"<redacted>")
            .field("account_enabled", &self.account_enabled)
            .field("labels", &self.labels)
            .finish()
    }
}

/// Directory user as returned by list and get
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Role assignment at a namespace scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: String,
    pub principal_id: String,
    pub role_id: String,
}

/// Credentials for one provisioned portal identity. The password exists
/// only here and in the session record; it is never logged.
#[derive(Clone, Serialize, Deserialize)]
pub struct LabIdentity {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LabIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of one binding-removal step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingOutcome {
    pub step: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BindingOutcome {
    pub fn succeeded(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_spec_debug_redacts_password() {
        let spec = UserSpec {
            username: "lab-user-a1b2c3d4@labs.example.com".to_string(),
            display_name: "Lab User a1b2c3d4".to_string(),
            password: "Sup3r$ecret16ch".to_string(),
            account_enabled: true,
            force_password_change: false,
            labels: UserLabels {
                lab: "course-1".to_string(),
                owner: "user-1".to_string(),
            },
        };
        let rendered = format!("{:?}", spec);
        assert!(rendered.contains("lab-user-a1b2c3d4"));
        assert!(!rendered.contains("Sup3r$ecret16ch"));
    }

    #[test]
    fn test_lab_identity_debug_redacts_password() {
        let identity = LabIdentity {
            id: "obj-1".to_string(),
            username: "lab-user-a1b2c3d4@labs.example.com".to_string(),
            password: "Sup3r$ecret16ch".to_string(),
        };
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains("Sup3r$ecret16ch"));
    }
}

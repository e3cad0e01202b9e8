//! Identity provisioning built on the directory API
//!
//! A portal identity lives exactly as long as one lab session. The username
//! carries a well-known prefix so leaked accounts can be found and reaped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::DirectoryApi;
use crate::error::DirectoryResult;
use crate::types::{BindingOutcome, LabIdentity, UserLabels, UserSpec};

/// Throwaway accounts all share this prefix; orphan cleanup keys off it
const IDENTITY_PREFIX: &str = "lab-user-";

/// Well-known policy assignment name, fixed so removal needs no stored state
const POLICY_ASSIGNMENT_NAME: &str = "lab-guardrails";

const PASSWORD_LENGTH: usize = 16;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*";

/// Business settings for identity provisioning
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// DNS domain appended to generated usernames
    pub domain: String,
    /// Role granted inside the lab namespace
    pub role_id: String,
    /// Policy set attached to the namespace as a guardrail
    pub policy_id: String,
}

impl IdentityConfig {
    pub fn new(
        domain: impl Into<String>,
        role_id: impl Into<String>,
        policy_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            role_id: role_id.into(),
            policy_id: policy_id.into(),
        }
    }
}

/// Seam between the orchestrator and the directory
#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
    /// Create a fresh portal account for one lab session
    async fn create_identity(&self, owner: &str, course: &str) -> DirectoryResult<LabIdentity>;

    /// Grant the identity access to its namespace: role first, then the
    /// policy guardrail on top
    async fn bind_access(&self, identity: &LabIdentity, namespace: &str) -> DirectoryResult<()>;

    /// Best-effort removal of the namespace bindings, reverse of bind order
    async fn remove_bindings(&self, principal_id: &str, namespace: &str) -> Vec<BindingOutcome>;

    /// Idempotent account deletion
    async fn delete_identity(&self, username: &str) -> DirectoryResult<()>;

    /// Reap prefix-matching accounts older than `max_age`; returns how many
    async fn cleanup_orphans(&self, max_age: chrono::Duration) -> DirectoryResult<usize>;
}

pub struct IdentityManager {
    api: Arc<dyn DirectoryApi>,
    config: IdentityConfig,
}

impl IdentityManager {
    pub fn new(api: Arc<dyn DirectoryApi>, config: IdentityConfig) -> Self {
        Self { api, config }
    }
}

#[async_trait]
impl IdentityProvisioner for IdentityManager {
    async fn create_identity(&self, owner: &str, course: &str) -> DirectoryResult<LabIdentity> {
        let suffix = unique_suffix(8);
        let username = format!("{}{}@{}", IDENTITY_PREFIX, suffix, self.config.domain);
        let password = generate_password(PASSWORD_LENGTH);

        info!("Creating directory identity {}", username);
        let spec = UserSpec {
            username: username.clone(),
            display_name: format!("Lab User {}", suffix),
            password: password.clone(),
            account_enabled: true,
            force_password_change: false,
            labels: UserLabels {
                lab: course.to_string(),
                owner: owner.to_string(),
            },
        };
        let id = self.api.create_user(&spec).await?;

        Ok(LabIdentity {
            id,
            username,
            password,
        })
    }

    async fn bind_access(&self, identity: &LabIdentity, namespace: &str) -> DirectoryResult<()> {
        let assignment_id = Uuid::new_v4().to_string();
        self.api
            .assign_role(namespace, &assignment_id, &identity.id, &self.config.role_id)
            .await?;
        debug!(
            "Role {} bound to {} in {}",
            self.config.role_id, identity.username, namespace
        );

        self.api
            .assign_policy(namespace, POLICY_ASSIGNMENT_NAME, &self.config.policy_id)
            .await?;
        info!(
            "Portal access bound for {} in {}",
            identity.username, namespace
        );
        Ok(())
    }

    async fn remove_bindings(&self, principal_id: &str, namespace: &str) -> Vec<BindingOutcome> {
        let mut outcomes = Vec::new();

        let policy = match self
            .api
            .delete_policy_assignment(namespace, POLICY_ASSIGNMENT_NAME)
            .await
        {
            Ok(()) => BindingOutcome::succeeded("policy"),
            Err(e) if e.is_not_found() => {
                debug!("Policy assignment already absent in {}", namespace);
                BindingOutcome::succeeded("policy")
            }
            Err(e) => {
                warn!("Could not remove policy assignment in {}: {}", namespace, e);
                BindingOutcome::failed("policy", e.to_string())
            }
        };
        outcomes.push(policy);

        let roles = match self.api.list_role_assignments(namespace).await {
            Ok(assignments) => {
                let mut failure = None;
                let mut removed = 0;
                for assignment in assignments
                    .iter()
                    .filter(|a| a.principal_id == principal_id)
                {
                    match self
                        .api
                        .delete_role_assignment(namespace, &assignment.id)
                        .await
                    {
                        Ok(()) => removed += 1,
                        Err(e) if e.is_not_found() => removed += 1,
                        Err(e) => {
                            warn!("Could not remove role assignment {}: {}", assignment.id, e);
                            failure = Some(e.to_string());
                        }
                    }
                }
                match failure {
                    None => {
                        debug!(
                            "Removed {} role assignments for {} in {}",
                            removed, principal_id, namespace
                        );
                        BindingOutcome::succeeded("roles")
                    }
                    Some(error) => BindingOutcome::failed("roles", error),
                }
            }
            Err(e) => BindingOutcome::failed("roles", e.to_string()),
        };
        outcomes.push(roles);

        outcomes
    }

    async fn delete_identity(&self, username: &str) -> DirectoryResult<()> {
        match self.api.delete_user(username).await {
            Ok(()) => {
                info!("Directory identity {} removed", username);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Directory identity {} already absent", username);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn cleanup_orphans(&self, max_age: chrono::Duration) -> DirectoryResult<usize> {
        let users = self.api.list_users(IDENTITY_PREFIX).await?;
        let cutoff = Utc::now() - max_age;

        let mut deleted = 0;
        for user in users {
            if user.created_at >= cutoff {
                continue;
            }
            info!(
                "Deleting orphaned identity {} created {}",
                user.username, user.created_at
            );
            match self.api.delete_user(&user.username).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => deleted += 1,
                Err(e) => warn!("Could not delete orphaned identity {}: {}", user.username, e),
            }
        }

        info!("Orphan cleanup removed {} identities", deleted);
        Ok(deleted)
    }
}

fn unique_suffix(len: usize) -> String {
    const DIGITS36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| DIGITS36[rng.gen_range(0..DIGITS36.len())] as char)
        .collect()
}

/// At least one character from every class, shuffled so the guaranteed
/// ones do not cluster at the front
fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut chars: Vec<char> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL]
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())] as char)
        .collect();

    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL].concat();
    while chars.len() < length {
        chars.push(all[rng.gen_range(0..all.len())] as char);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

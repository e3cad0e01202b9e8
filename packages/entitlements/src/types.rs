use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default access window granted at purchase, in days
pub const DEFAULT_ACCESS_WINDOW_DAYS: i64 = 180;

/// Default number of launches per purchased seat
pub const DEFAULT_MAX_LAUNCHES: i64 = 10;

/// Default wall-clock lifetime of one lab session, in hours
pub const DEFAULT_SESSION_DURATION_HOURS: i64 = 4;

/// Lifecycle state of a lab session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Resources are being created or the instance has no address yet
    Provisioning,
    /// Instance is up and the gateway session is bound
    Running,
    /// Namespace is gone; a fresh launch is required
    Stopped,
    /// Provisioning ended in an unrecoverable state
    Failed,
}

/// Point-in-time copy of an instance's system disk.
///
/// Name and id always travel together; a snapshot is scoped to the
/// namespace it was taken in and dies with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Remote-gateway binding minted for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBinding {
    pub connection_id: String,
    pub username: String,
    pub password: String,
    pub auth_token: String,
}

/// Ephemeral directory identity with portal access scoped to a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevatedAccess {
    /// Principal name (user@domain)
    pub principal: String,
    pub password: String,
    pub object_id: String,
    /// Namespace the identity's role and policy bindings are scoped to
    pub namespace: String,
}

/// Live binding between a LabEntry and provisioned resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSession {
    /// Resource namespace holding this session's instance
    pub namespace: String,
    pub instance_name: String,
    pub gateway: Option<GatewayBinding>,
    pub elevated: Option<ElevatedAccess>,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One completed launch/close cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub launched_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// One purchased seat of a course for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabEntry {
    pub purchase_id: String,
    pub user_id: String,
    pub course_id: String,
    pub purchase_date: DateTime<Utc>,
    /// Lazily initialized to purchase date + access window on first launch
    pub access_expires_at: Option<DateTime<Utc>>,
    pub launch_count: i64,
    pub max_launches: i64,
    pub session_duration_hours: i64,
    /// Sticky resource namespace, reused across launches until discarded
    pub namespace: Option<String>,
    pub snapshot: Option<SnapshotRef>,
    pub active_session: Option<ActiveSession>,
    pub total_time_spent_minutes: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub launch_history: Vec<LaunchRecord>,
    /// Optimistic-concurrency counter, bumped by every successful save
    pub revision: i64,
}

impl LabEntry {
    pub fn remaining_launches(&self) -> i64 {
        (self.max_launches - self.launch_count).max(0)
    }

    pub fn launches_exhausted(&self) -> bool {
        self.launch_count >= self.max_launches
    }

    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        match self.access_expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry() -> LabEntry {
        LabEntry {
            purchase_id: "p1".to_string(),
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            purchase_date: Utc::now(),
            access_expires_at: None,
            launch_count: 0,
            max_launches: DEFAULT_MAX_LAUNCHES,
            session_duration_hours: DEFAULT_SESSION_DURATION_HOURS,
            namespace: None,
            snapshot: None,
            active_session: None,
            total_time_spent_minutes: 0,
            last_accessed_at: None,
            launch_history: Vec::new(),
            revision: 0,
        }
    }

    #[test]
    fn test_remaining_launches_never_negative() {
        let mut e = entry();
        e.launch_count = 12;
        assert_eq!(e.remaining_launches(), 0);
        assert!(e.launches_exhausted());
    }

    #[test]
    fn test_unset_expiry_is_not_expired() {
        let e = entry();
        assert!(!e.access_expired(Utc::now()));
    }

    #[test]
    fn test_access_expiry_boundary() {
        let mut e = entry();
        let now = Utc::now();
        e.access_expires_at = Some(now);
        assert!(!e.access_expired(now));
        assert!(e.access_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_session_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Provisioning).unwrap();
        assert_eq!(json, r#""provisioning""#);
        let back: SessionStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(back, SessionStatus::Running);
    }
}

//! Shared output helpers for CLI commands

use chrono::{DateTime, Utc};
use labrack_entitlements::SessionStatus;

pub fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Provisioning => "provisioning",
        SessionStatus::Running => "running",
        SessionStatus::Stopped => "stopped",
        SessionStatus::Failed => "failed",
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

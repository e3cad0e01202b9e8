// ABOUTME: Output types for orchestrated lab operations
// ABOUTME: Launch results, close step reports, live status views, and sweep summaries

use chrono::{DateTime, Utc};
use labrack_entitlements::{ActiveSession, ElevatedAccess, SessionStatus};
use labrack_provisioner::StepOutcome;
use serde::Serialize;

/// Everything a caller needs after a successful launch
#[derive(Debug, Clone, Serialize)]
pub struct LaunchOutput {
    pub session: ActiveSession,
    /// Direct auto-login client URL, present once the gateway is bound
    pub connection_url: Option<String>,
    /// Portal credentials, present for courses with elevated access
    pub portal_access: Option<ElevatedAccess>,
    pub launch_count: i64,
    pub max_launches: i64,
    pub remaining_launches: i64,
    pub access_expires_at: DateTime<Utc>,
    pub session_expires_at: DateTime<Utc>,
    pub restored_from_snapshot: bool,
    pub reused_namespace: bool,
}

/// Result of one close run
#[derive(Debug, Clone, Serialize)]
pub struct CloseOutput {
    pub snapshot_created: bool,
    pub message: String,
    pub report: CloseReport,
}

/// Ordered record of every teardown step a close attempted.
///
/// Steps are best-effort and isolated; a failed step is recorded and the
/// close moves on, so the report is the only place a partial teardown
/// shows up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CloseReport {
    pub steps: Vec<StepOutcome>,
}

impl CloseReport {
    pub fn record(&mut self, outcome: StepOutcome) {
        self.steps.push(outcome);
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = StepOutcome>) {
        self.steps.extend(outcomes);
    }

    pub fn all_ok(&self) -> bool {
        self.steps.iter().all(|step| step.ok)
    }

    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.steps.iter().filter(|step| !step.ok).collect()
    }
}

/// Live view of a lab, read from the fabric rather than from stored state
#[derive(Debug, Clone, Serialize)]
pub struct LabStatus {
    pub purchase_id: String,
    pub status: SessionStatus,
    pub instance_name: Option<String>,
    pub address: Option<String>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub launch_count: i64,
    pub max_launches: i64,
    pub remaining_launches: i64,
}

/// Summary of one expired-session sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    /// Sessions whose expiry had passed when the sweep ran
    pub expired: usize,
    pub destroyed: usize,
    pub failed: usize,
}

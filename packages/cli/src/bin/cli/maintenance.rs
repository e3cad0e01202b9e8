//! Janitor commands for expired sessions and leftover identities

use chrono::{Duration, Utc};
use clap::Subcommand;
use colored::*;

use labrack_cli::runtime::Runtime;
use labrack_directory::IdentityProvisioner;

#[derive(Subcommand)]
pub enum SweepCommands {
    /// Destroy labs whose sessions ran past their expiry
    Expired,
    /// Delete lab identities left behind by failed closes
    Orphans {
        /// Only remove identities older than this many hours
        #[arg(long, default_value = "24")]
        max_age_hours: i64,
    },
}

pub async fn handle_sweep_command(runtime: &Runtime, command: SweepCommands) -> anyhow::Result<()> {
    match command {
        SweepCommands::Expired => sweep_expired(runtime).await,
        SweepCommands::Orphans { max_age_hours } => sweep_orphans(runtime, max_age_hours).await,
    }
}

async fn sweep_expired(runtime: &Runtime) -> anyhow::Result<()> {
    let report = runtime.orchestrator.sweep_expired(Utc::now()).await?;

    if report.expired == 0 {
        println!("{}", "No expired sessions".green());
        return Ok(());
    }

    println!(
        "Swept {} expired sessions: {} destroyed, {} failed",
        report.expired, report.destroyed, report.failed
    );
    if report.failed > 0 {
        println!(
            "{}",
            "Some teardowns failed; they will be retried on the next sweep".yellow()
        );
    }
    Ok(())
}

async fn sweep_orphans(runtime: &Runtime, max_age_hours: i64) -> anyhow::Result<()> {
    let removed = runtime
        .identities
        .cleanup_orphans(Duration::hours(max_age_hours))
        .await?;

    if removed == 0 {
        println!("{}", "No orphaned lab identities".green());
    } else {
        println!("Removed {} orphaned lab identities", removed);
    }
    Ok(())
}

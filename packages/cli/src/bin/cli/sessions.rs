//! Session lifecycle commands routed through the orchestrator

use colored::*;

use labrack_cli::runtime::Runtime;
use labrack_entitlements::SessionStatus;

use super::utils::{format_timestamp, status_label};

pub async fn launch(
    runtime: &Runtime,
    user: &str,
    course: &str,
    purchase: &str,
) -> anyhow::Result<()> {
    println!("{}", "Launching lab (this can take a few minutes)...".cyan());

    let output = runtime.orchestrator.launch(user, course, purchase).await?;

    println!("{}", "Lab launched".green().bold());
    println!("   Instance:  {}", output.session.instance_name);
    println!("   Namespace: {}", output.session.namespace);
    println!("   Status:    {}", status_label(output.session.status));
    println!(
        "   Launches:  {} of {} used, {} left",
        output.launch_count, output.max_launches, output.remaining_launches
    );
    println!(
        "   Session until: {}",
        format_timestamp(output.session_expires_at)
    );
    if output.restored_from_snapshot {
        println!("   {}", "Previous work restored from snapshot".cyan());
    }
    match &output.connection_url {
        Some(url) => println!("   Connect:   {}", url.underline()),
        None => println!(
            "   {}",
            "Gateway link not ready yet; check 'labrack status' shortly".yellow()
        ),
    }
    if let Some(portal) = &output.portal_access {
        println!("   Portal user: {}", portal.principal);
        println!("   Portal pass: {}", portal.password);
    }
    Ok(())
}

pub async fn close(runtime: &Runtime, purchase: &str) -> anyhow::Result<()> {
    println!("{}", "Closing lab session...".cyan());

    let output = runtime.orchestrator.close(purchase).await?;

    if output.snapshot_created {
        println!("{}", "Session closed; work saved".green().bold());
    } else {
        println!("{}", "Session closed without a snapshot".yellow().bold());
    }
    println!("   {}", output.message);

    let failures = output.report.failures();
    if !failures.is_empty() {
        println!("   {}", "Some cleanup steps failed:".yellow());
        for step in failures {
            println!(
                "     {}: {}",
                step.step.yellow(),
                step.error.as_deref().unwrap_or("unknown")
            );
        }
    }
    Ok(())
}

pub async fn status(runtime: &Runtime, purchase: &str, json: bool) -> anyhow::Result<()> {
    let status = runtime.orchestrator.status(purchase).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let label = status_label(status.status);
    let label = match status.status {
        SessionStatus::Running => label.green(),
        SessionStatus::Provisioning => label.yellow(),
        SessionStatus::Stopped => label.dimmed(),
        SessionStatus::Failed => label.red(),
    };
    println!("{} {}", "Lab status:".bold(), label);
    if let Some(name) = &status.instance_name {
        println!("   Instance: {}", name);
    }
    if let Some(address) = &status.address {
        println!("   Address:  {}", address);
    }
    if let Some(expires) = status.session_expires_at {
        println!("   Session until: {}", format_timestamp(expires));
    }
    println!(
        "   Launches: {} of {} used, {} left",
        status.launch_count, status.max_launches, status.remaining_launches
    );
    Ok(())
}

pub async fn restart(runtime: &Runtime, purchase: &str) -> anyhow::Result<()> {
    runtime.orchestrator.restart(purchase).await?;
    println!("{}", "Instance restart requested".green());
    Ok(())
}

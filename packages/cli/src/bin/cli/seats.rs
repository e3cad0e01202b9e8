//! Seat management commands backed directly by the entitlement store

use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

use labrack_cli::runtime::Runtime;
use labrack_entitlements::{EntitlementStore, EntryCreateInput};

use super::utils::status_label;

pub async fn grant(
    runtime: &Runtime,
    user: String,
    course: String,
    purchase: Option<String>,
    max_launches: Option<i64>,
    session_hours: Option<i64>,
) -> anyhow::Result<()> {
    let entry = runtime
        .store
        .create_entry(EntryCreateInput {
            user_id: user,
            course_id: course,
            purchase_id: purchase,
            max_launches,
            session_duration_hours: session_hours,
        })
        .await?;

    println!("{}", "Seat granted".green().bold());
    println!("   Purchase: {}", entry.purchase_id);
    println!("   User:     {}", entry.user_id);
    println!("   Course:   {}", entry.course_id);
    println!("   Launches: {}", entry.max_launches);
    println!("   Session:  {}h", entry.session_duration_hours);
    Ok(())
}

pub async fn entries(runtime: &Runtime, user: &str) -> anyhow::Result<()> {
    let entries = runtime.store.list_entries(user).await?;

    if entries.is_empty() {
        println!("{}", "No lab seats found".yellow());
        println!("{}", "Use 'labrack grant' to create one".dimmed());
        return Ok(());
    }

    println!("{}", format!("Lab seats for {}", user).blue().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Purchase", "Course", "Launches", "Time spent", "Session", "Access until",
    ]);

    for entry in &entries {
        let session_text = match &entry.active_session {
            Some(session) => status_label(session.status).to_string(),
            None => "none".to_string(),
        };
        let access_text = entry
            .access_expires_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unset".to_string());

        table.add_row(vec![
            entry.purchase_id.clone(),
            entry.course_id.clone(),
            format!("{}/{}", entry.launch_count, entry.max_launches),
            format!("{} min", entry.total_time_spent_minutes),
            session_text,
            access_text,
        ]);
    }

    println!("{table}");
    Ok(())
}

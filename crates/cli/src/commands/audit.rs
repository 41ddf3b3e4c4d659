//! Audit trail and CSV export commands

use anyhow::{Context, Result};
use tabled::Tabled;

use crate::client::{ApiClient, AuditEntry};
use crate::output::{
    color_status, format_timestamp, format_utilization, print_items, print_success, OutputFormat,
};

/// Row for audit table
#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "#")]
    id: u64,
    #[tabled(rename = "Instance")]
    resource_id: i64,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "When")]
    timestamp: String,
}

impl From<&AuditEntry> for AuditRow {
    fn from(e: &AuditEntry) -> Self {
        Self {
            id: e.id,
            resource_id: e.resource_id,
            action: e.action.clone(),
            before: format!(
                "{} {}",
                format_utilization(e.old_utilization),
                color_status(&e.old_status)
            ),
            after: format!(
                "{} {}",
                format_utilization(e.new_utilization),
                color_status(&e.new_status)
            ),
            actor: e.actor.clone(),
            timestamp: format_timestamp(&e.timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ExportKind {
    Audit,
    Recommendations,
}

/// Show the global audit trail
pub async fn show_audit(
    client: &ApiClient,
    limit: usize,
    order: Order,
    format: OutputFormat,
) -> Result<()> {
    let order = match order {
        Order::Asc => "asc",
        Order::Desc => "desc",
    };
    let entries: Vec<AuditEntry> = client
        .get(&format!("audit?limit={}&order={}", limit, order))
        .await?;
    print_items(&entries, format, "No audit entries", |e| AuditRow::from(e))
}

/// Show the history of one instance, newest first
pub async fn show_history(
    client: &ApiClient,
    id: i64,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let entries: Vec<AuditEntry> = client
        .get(&format!("instances/{}/audit?limit={}", id, limit))
        .await?;
    print_items(
        &entries,
        format,
        &format!("No history for instance {}", id),
        |e| AuditRow::from(e),
    )
}

/// Download a CSV export to a file or stdout
pub async fn export(
    client: &ApiClient,
    kind: ExportKind,
    limit: Option<usize>,
    output: Option<String>,
) -> Result<()> {
    let path = match (kind, limit) {
        (ExportKind::Audit, Some(limit)) => format!("export/audit?limit={}", limit),
        (ExportKind::Audit, None) => "export/audit".to_string(),
        (ExportKind::Recommendations, _) => "export/recommendations".to_string(),
    };

    let csv = client.get_text(&path).await?;

    match output {
        Some(file) => {
            std::fs::write(&file, &csv).with_context(|| format!("Failed to write {}", file))?;
            let rows = csv.lines().count().saturating_sub(1);
            print_success(&format!("Exported {} rows to {}", rows, file));
        }
        None => print!("{}", csv),
    }

    Ok(())
}

//! Usage ledger commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, NewUsage, UsageRecord};
use crate::output::{format_cost, format_timestamp, print_items, print_json, print_success, OutputFormat};

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Recorded")]
    timestamp: String,
}

pub async fn add_usage(client: &ApiClient, usage: NewUsage, format: OutputFormat) -> Result<()> {
    let record: UsageRecord = client.post("usage", &usage).await?;

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => print_success(&format!(
            "Recorded usage #{} for {} ({} {})",
            record.id, record.resource_id, record.cloud_provider, record.service_name
        )),
    }

    Ok(())
}

pub async fn list_usage(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let records: Vec<UsageRecord> = client.get("usages").await?;

    print_items(&records, format, "No usage recorded", |r| UsageRow {
        id: r.id,
        provider: r.cloud_provider.clone(),
        service: r.service_name.clone(),
        resource_id: r.resource_id.clone(),
        usage: format!("{:.2}", r.usage_amount),
        cost: format_cost(r.cost),
        timestamp: format_timestamp(&r.timestamp),
    })
}

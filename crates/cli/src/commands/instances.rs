//! Instance listing, state transitions and reseeding

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Instance, ReseedResponse, TransitionResponse};
use crate::output::{
    color_status, format_cost, format_utilization, print_info, print_items, print_json,
    print_success, OutputFormat,
};

/// Row for instances table
#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CPU")]
    utilization: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&Instance> for InstanceRow {
    fn from(i: &Instance) -> Self {
        Self {
            id: i.id,
            name: i.name.clone(),
            utilization: format_utilization(i.utilization),
            status: color_status(&i.status),
            cost: format_cost(i.cost),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Transition {
    Idle,
    Busy,
}

impl Transition {
    fn path(self) -> &'static str {
        match self {
            Transition::Idle => "make_idle",
            Transition::Busy => "make_busy",
        }
    }
}

/// List all instances
pub async fn list_instances(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let instances: Vec<Instance> = client.get("instances").await?;
    print_items(&instances, format, "No instances found", |i| InstanceRow::from(i))
}

/// Show a single instance
pub async fn show_instance(client: &ApiClient, id: i64, format: OutputFormat) -> Result<()> {
    let instance: Instance = client.get(&format!("instances/{}", id)).await?;
    print_items(
        std::slice::from_ref(&instance),
        format,
        "No instance found",
        |i| InstanceRow::from(i),
    )
}

/// Move an instance to idle or busy and print the resulting audit entry
pub async fn transition(
    client: &ApiClient,
    id: i64,
    transition: Transition,
    actor: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut path = format!("{}/{}", transition.path(), id);
    if let Some(actor) = actor {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("actor", actor)
            .finish();
        path = format!("{}?{}", path, query);
    }

    let response: TransitionResponse = client.post_empty(&path).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            let audit = &response.audit;
            print_success(&format!(
                "{} is now {} at {}",
                response.updated.name,
                color_status(&response.updated.status),
                format_utilization(response.updated.utilization)
            ));
            print_info(&format!(
                "Audit #{}: {} {} -> {} by {}",
                audit.id,
                audit.action,
                format_utilization(audit.old_utilization),
                format_utilization(audit.new_utilization),
                audit.actor
            ));
        }
    }

    Ok(())
}

/// Reinstall the demo instances and clear the audit trail
pub async fn reseed(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ReseedResponse = client.post_empty("admin/reseed").await?;

    if let OutputFormat::Table = format {
        print_success(&format!("Reseeded {} instances", response.resources.len()));
    }
    print_items(&response.resources, format, "No instances seeded", |i| InstanceRow::from(i))
}

//! Recommendation-related CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Recommendation};
use crate::output::{format_cost, print_items, OutputFormat};

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
    #[tabled(rename = "Saving")]
    saving: String,
}

fn display_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query string for an evaluation request
pub fn evaluation_path(usage: bool, threshold: Option<f64>, strict: bool) -> String {
    let base = if usage {
        "analysis/idle_recommendations"
    } else {
        "recommendations"
    };

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(t) = threshold {
        query.append_pair("threshold", &t.to_string());
    }
    if strict {
        query.append_pair("strict", "true");
    }
    let query = query.finish();

    if query.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, query)
    }
}

/// Get recommendations for instances or recorded usage
pub async fn get_recommendations(
    client: &ApiClient,
    usage: bool,
    threshold: Option<f64>,
    strict: bool,
    format: OutputFormat,
) -> Result<()> {
    let recs: Vec<Recommendation> = client
        .get(&evaluation_path(usage, threshold, strict))
        .await?;

    print_items(&recs, format, "No idle resources found", |r| RecommendationRow {
        resource_id: display_id(&r.resource_id),
        name: r.name.clone(),
        recommendation: r.recommendation.clone(),
        saving: format_cost(r.saving),
    })?;

    if let OutputFormat::Table = format {
        if !recs.is_empty() {
            let total: f64 = recs.iter().map(|r| r.saving).sum();
            println!("\nPotential saving: {}", format_cost(total));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_path() {
        assert_eq!(evaluation_path(false, None, false), "recommendations");
        assert_eq!(
            evaluation_path(true, Some(10.0), true),
            "analysis/idle_recommendations?threshold=10&strict=true"
        );
    }

    #[test]
    fn test_display_id() {
        assert_eq!(display_id(&serde_json::json!(3)), "3");
        assert_eq!(display_id(&serde_json::json!("i-0abc")), "i-0abc");
    }
}

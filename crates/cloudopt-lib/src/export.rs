//! Delimited-text export of read-only core outputs

use crate::models::{AuditEntry, Recommendation};
use anyhow::{Context, Result};

/// Header of the recommendations export
pub const RECOMMENDATION_COLUMNS: [&str; 4] = ["instance_id", "name", "recommendation", "saving"];

/// Header of the audit export
pub const AUDIT_COLUMNS: [&str; 9] = [
    "id",
    "instance_id",
    "action",
    "old_cpu",
    "old_status",
    "new_cpu",
    "new_status",
    "timestamp",
    "actor",
];

/// Render recommendations as CSV
pub fn recommendations_csv(recommendations: &[Recommendation]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RECOMMENDATION_COLUMNS)?;

    for r in recommendations {
        writer.write_record([
            r.resource_id.to_string(),
            r.name.clone(),
            r.recommendation.clone(),
            r.saving.to_string(),
        ])?;
    }

    finish(writer)
}

/// Render audit entries as CSV, in the order given
pub fn audit_csv(entries: &[AuditEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(AUDIT_COLUMNS)?;

    for e in entries {
        writer.write_record([
            e.id.to_string(),
            e.resource_id.to_string(),
            e.action.clone(),
            e.old_utilization.to_string(),
            e.old_status.to_string(),
            e.new_utilization.to_string(),
            e.new_status.to_string(),
            e.timestamp.to_rfc3339(),
            e.actor.clone(),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordId, ResourceStatus};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_recommendations_csv_quotes_fields() {
        let recs = vec![Recommendation {
            resource_id: RecordId::Int(1),
            name: "dev, server".to_string(),
            recommendation: "Shutdown idle server".to_string(),
            saving: 25.0,
        }];

        let out = recommendations_csv(&recs).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "instance_id,name,recommendation,saving");
        assert_eq!(lines[1], "1,\"dev, server\",Shutdown idle server,25");
    }

    #[test]
    fn test_audit_csv_columns() {
        let entries = vec![AuditEntry {
            id: 4,
            resource_id: 3,
            action: "make_idle".to_string(),
            old_utilization: 65.0,
            old_status: ResourceStatus::Running,
            new_utilization: 0.0,
            new_status: ResourceStatus::Idle,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            actor: "demo-user".to_string(),
        }];

        let out = audit_csv(&entries).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "4,3,make_idle,65,running,0,idle,2024-05-01T12:00:00+00:00,demo-user"
        );
    }

    #[test]
    fn test_empty_exports_have_headers_only() {
        assert_eq!(recommendations_csv(&[]).unwrap().lines().count(), 1);
        assert_eq!(audit_csv(&[]).unwrap().lines().count(), 1);
    }
}

//! Observability infrastructure for the cost optimizer
//!
//! Provides:
//! - Prometheus metrics (transition latency and counts, audit size, recommendations)
//! - Structured JSON logging with tracing

use crate::models::{AuditEntry, Recommendation};
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for transition latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CostMetricsInner> = OnceLock::new();

struct CostMetricsInner {
    transition_latency_seconds: Histogram,
    transitions: IntCounterVec,
    transition_errors: IntCounterVec,
    audit_entries: IntGauge,
    resources_tracked: IntGauge,
    usage_records: IntGauge,
    recommendations: IntCounterVec,
    rejected_evaluations: IntCounterVec,
}

impl CostMetricsInner {
    fn new() -> Self {
        Self {
            transition_latency_seconds: register_histogram!(
                "cloudopt_transition_latency_seconds",
                "Time spent committing a state transition and its audit entry",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register transition_latency_seconds"),

            transitions: register_int_counter_vec!(
                "cloudopt_transitions_total",
                "Committed state transitions by action",
                &["action"]
            )
            .expect("Failed to register transitions_total"),

            transition_errors: register_int_counter_vec!(
                "cloudopt_transition_errors_total",
                "Failed state transitions by error kind",
                &["kind"]
            )
            .expect("Failed to register transition_errors_total"),

            audit_entries: register_int_gauge!(
                "cloudopt_audit_entries",
                "Number of entries in the audit trail"
            )
            .expect("Failed to register audit_entries"),

            resources_tracked: register_int_gauge!(
                "cloudopt_resources_tracked",
                "Number of resources currently tracked"
            )
            .expect("Failed to register resources_tracked"),

            usage_records: register_int_gauge!(
                "cloudopt_usage_records",
                "Number of records in the usage ledger"
            )
            .expect("Failed to register usage_records"),

            recommendations: register_int_counter_vec!(
                "cloudopt_recommendations_total",
                "Recommendations produced by source",
                &["source"]
            )
            .expect("Failed to register recommendations_total"),

            rejected_evaluations: register_int_counter_vec!(
                "cloudopt_rejected_evaluations_total",
                "Strict evaluations rejected for malformed input by source",
                &["source"]
            )
            .expect("Failed to register rejected_evaluations_total"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct CostMetrics {
    _private: (),
}

impl Default for CostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CostMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CostMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CostMetricsInner {
        GLOBAL_METRICS.get_or_init(CostMetricsInner::new)
    }

    /// Record a committed transition
    pub fn observe_transition(&self, action: &str, duration_secs: f64) {
        self.inner().transition_latency_seconds.observe(duration_secs);
        self.inner().transitions.with_label_values(&[action]).inc();
    }

    /// Record a failed transition; `kind` is the error kind label
    pub fn inc_transition_errors(&self, kind: &str) {
        self.inner().transition_errors.with_label_values(&[kind]).inc();
    }

    pub fn set_audit_entries(&self, count: i64) {
        self.inner().audit_entries.set(count);
    }

    pub fn set_resources_tracked(&self, count: i64) {
        self.inner().resources_tracked.set(count);
    }

    pub fn set_usage_records(&self, count: i64) {
        self.inner().usage_records.set(count);
    }

    pub fn inc_recommendations(&self, source: &str, count: u64) {
        self.inner()
            .recommendations
            .with_label_values(&[source])
            .inc_by(count);
    }

    pub fn inc_rejected_evaluations(&self, source: &str) {
        self.inner()
            .rejected_evaluations
            .with_label_values(&[source])
            .inc();
    }
}

/// Structured logger for service events
///
/// Emits consistent JSON-formatted events for transitions, reseeds and
/// recommendation runs.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Log a committed transition
    pub fn log_transition(&self, entry: &AuditEntry) {
        info!(
            event = "transition_applied",
            service = %self.service,
            audit_id = entry.id,
            resource_id = entry.resource_id,
            action = %entry.action,
            old_utilization = entry.old_utilization,
            old_status = %entry.old_status,
            new_utilization = entry.new_utilization,
            new_status = %entry.new_status,
            actor = %entry.actor,
            "State transition applied"
        );
    }

    /// Log a transition that did not commit
    pub fn log_transition_failed(&self, resource_id: i64, action: &str, error: &str) {
        warn!(
            event = "transition_failed",
            service = %self.service,
            resource_id = resource_id,
            action = %action,
            error = %error,
            "State transition failed"
        );
    }

    /// Log a recommendation run
    pub fn log_recommendations(&self, source: &str, evaluated: usize, recommendations: &[Recommendation]) {
        let saving: f64 = recommendations.iter().map(|r| r.saving).sum();
        info!(
            event = "recommendations_evaluated",
            service = %self.service,
            source = %source,
            evaluated = evaluated,
            recommended = recommendations.len(),
            estimated_saving = saving,
            "Evaluated idle recommendations"
        );
    }

    /// Log a bulk reset
    pub fn log_reseed(&self, resources: usize) {
        warn!(
            event = "store_reseeded",
            service = %self.service,
            resources = resources,
            "Resource and audit tables reset"
        );
    }

    pub fn log_startup(&self, version: &str, addr: &str) {
        info!(
            event = "server_started",
            service = %self.service,
            version = %version,
            addr = %addr,
            "Cost optimizer started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            service = %self.service,
            reason = %reason,
            "Cost optimizer shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceStatus;
    use chrono::Utc;

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = CostMetrics::new();
        let b = a.clone();

        a.observe_transition("make_idle", 0.001);
        b.inc_transition_errors("not_found");
        a.set_audit_entries(3);
        b.set_resources_tracked(3);
        a.set_usage_records(0);
        b.inc_recommendations("instances", 2);
        a.inc_rejected_evaluations("usage");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "cloudopt_transitions_total"));
    }

    #[test]
    fn test_structured_logger_events() {
        let logger = StructuredLogger::new("cloudopt-test");
        assert_eq!(logger.service, "cloudopt-test");

        logger.log_transition(&AuditEntry {
            id: 1,
            resource_id: 1,
            action: "make_idle".to_string(),
            old_utilization: 3.0,
            old_status: ResourceStatus::Running,
            new_utilization: 0.0,
            new_status: ResourceStatus::Idle,
            timestamp: Utc::now(),
            actor: "demo-user".to_string(),
        });
        logger.log_recommendations("instances", 3, &[]);
        logger.log_reseed(3);
    }
}

//! Core data models for the cost optimizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked resource
pub type ResourceId = i64;

/// Default actor recorded when a caller does not identify itself
pub const DEFAULT_ACTOR: &str = "demo-user";

/// Lifecycle state of a monitored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Running,
    Idle,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Running => "running",
            ResourceStatus::Idle => "idle",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored compute instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    /// CPU utilization in percent
    pub utilization: f64,
    pub status: ResourceStatus,
    /// Estimated recurring cost
    pub cost: f64,
}

/// Seed input for a resource, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    pub name: String,
    pub utilization: f64,
    pub status: ResourceStatus,
    pub cost: f64,
}

impl NewResource {
    pub fn new(name: impl Into<String>, utilization: f64, status: ResourceStatus, cost: f64) -> Self {
        Self {
            name: name.into(),
            utilization,
            status,
            cost,
        }
    }
}

/// New utilization/status pair produced by a transition mutator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub utilization: f64,
    pub status: ResourceStatus,
}

/// Immutable record of one state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub resource_id: ResourceId,
    pub action: String,
    pub old_utilization: f64,
    pub old_status: ResourceStatus,
    pub new_utilization: f64,
    pub new_status: ResourceStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// A billing/usage observation imported from a cloud provider ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: u64,
    /// e.g. AWS, GCP, Azure
    pub cloud_provider: String,
    /// e.g. EC2, S3
    pub service_name: String,
    pub resource_id: String,
    /// Hours, GB, etc.
    pub usage_amount: f64,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
}

/// Usage record as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub cloud_provider: String,
    pub service_name: String,
    pub resource_id: String,
    pub usage_amount: f64,
    pub cost: f64,
}

/// Identity of an evaluated record; live resources use integers, ledger rows may not
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

/// Savings recommendation derived from a record snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub resource_id: RecordId,
    pub name: String,
    pub recommendation: String,
    pub saving: f64,
}

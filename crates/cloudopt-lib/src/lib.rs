//! Core library for the cloud cost optimizer
//!
//! This crate provides:
//! - Recommendation engine flagging idle, wasteful resources
//! - Transactional state store with an append-only audit trail
//! - Usage ledger of imported billing records
//! - CSV export of recommendations and audit history
//! - Health checks and observability

pub mod error;
pub mod export;
pub mod health;
pub mod models;
pub mod observability;
pub mod recommend;
pub mod seed;
pub mod store;
pub mod usage;

pub use error::{CoreError, CoreResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{CostMetrics, StructuredLogger};
pub use recommend::{CostRecord, EvaluationMode, RawRecord, RecommendationEngine};
pub use store::{AuditOrder, AuditStore, JournalBackend, MemoryBackend};
pub use usage::UsageLedger;

//! Cloud cost optimizer server
//!
//! Wires the core store, usage ledger and recommendation engine into an
//! axum application according to [`config::ServerConfig`].

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use api::AppState;
use cloudopt_lib::{
    health::{components, HealthRegistry},
    observability::CostMetrics,
    recommend::RecommendationEngine,
    seed,
    store::{AuditStore, JournalBackend, SeededUtilization},
    UsageLedger,
};
use config::ServerConfig;
use std::sync::Arc;
use tracing::info;

/// Build the application state described by `config`
///
/// Opens the journal and usage snapshot when configured, reseeds the demo
/// resources if asked to (or if the store came up empty) and marks the
/// service ready.
pub async fn bootstrap(config: &ServerConfig) -> Result<Arc<AppState>> {
    config.validate()?;

    let utilization = match config.rng_seed {
        Some(seed) => SeededUtilization::new(seed),
        None => SeededUtilization::from_entropy(),
    };

    let mut builder = AuditStore::builder()
        .utilization_source(utilization)
        .busy_range(config.busy_range())
        .default_actor(config.default_actor.clone());

    if let Some(ref path) = config.journal_path {
        let journal = JournalBackend::open(path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;
        builder = builder.backend(journal);
    }

    let store = Arc::new(builder.build().context("Failed to restore audit store")?);

    let ledger = match config.usage_path {
        Some(ref path) => UsageLedger::with_persistence(path)
            .with_context(|| format!("Failed to load usage ledger {}", path.display()))?,
        None => UsageLedger::new(),
    };

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::USAGE_LEDGER).await;
    health_registry.register(components::API).await;

    let metrics = CostMetrics::new();

    let state = Arc::new(AppState::new(
        store,
        Arc::new(ledger),
        RecommendationEngine::with_threshold(config.idle_threshold),
        seed::demo_resources(),
        health_registry,
        metrics,
    ));

    let resources = state.store.list_resources().await;
    if config.reseed_on_start || resources.is_empty() {
        state.reseed().await.context("Failed to seed demo resources")?;
    } else {
        info!(resources = resources.len(), "Keeping restored resources");
        state.metrics.set_resources_tracked(resources.len() as i64);
        state
            .metrics
            .set_audit_entries(state.store.audit_len().await as i64);
    }
    state
        .metrics
        .set_usage_records(state.ledger.len().await as i64);

    state.health_registry.set_ready(true).await;
    Ok(state)
}

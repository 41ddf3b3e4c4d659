//! HTTP API: instances, transitions, audit, usage ledger, exports, health and metrics

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cloudopt_lib::{
    export,
    health::{components, ComponentStatus, HealthRegistry},
    observability::{CostMetrics, StructuredLogger},
    recommend::{EvaluationMode, RecommendationEngine},
    store::{AuditOrder, DEFAULT_AUDIT_LIMIT},
    AuditEntry, AuditStore, CoreError, CostRecord, NewResource, NewUsageRecord, Recommendation,
    Resource, ResourceId, UsageLedger, UsageRecord,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Default number of audit rows in the CSV export
const DEFAULT_EXPORT_LIMIT: usize = 100;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AuditStore>,
    pub ledger: Arc<UsageLedger>,
    pub engine: RecommendationEngine,
    pub seed: Vec<NewResource>,
    pub health_registry: HealthRegistry,
    pub metrics: CostMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        store: Arc<AuditStore>,
        ledger: Arc<UsageLedger>,
        engine: RecommendationEngine,
        seed: Vec<NewResource>,
        health_registry: HealthRegistry,
        metrics: CostMetrics,
    ) -> Self {
        Self {
            store,
            ledger,
            engine,
            seed,
            health_registry,
            metrics,
            logger: StructuredLogger::new("cloudopt-server"),
        }
    }

    /// Reinstall the seed set and refresh gauges
    pub async fn reseed(&self) -> Result<Vec<Resource>, CoreError> {
        let result = self.store.reseed(self.seed.clone()).await;
        self.health_registry.observe(components::STORE, &result).await;

        let resources = result?;
        self.logger.log_reseed(resources.len());
        self.metrics.set_resources_tracked(resources.len() as i64);
        self.metrics.set_audit_entries(0);
        Ok(resources)
    }
}

/// Error response; maps core error kinds onto HTTP statuses
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Core(err) => {
                let status = match err {
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Conflict(_) => StatusCode::CONFLICT,
                    CoreError::InvalidRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                let body = json!({
                    "detail": err.to_string(),
                    "kind": err.kind(),
                    "retryable": err.is_retryable(),
                });
                (status, Json(body)).into_response()
            }
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": err.to_string(), "kind": "internal" })),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ActorQuery {
    pub actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluateQuery {
    /// Per-call override of the configured threshold
    pub threshold: Option<f64>,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderParam {
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub order: Option<OrderParam>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub updated: Resource,
    pub audit: AuditEntry,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReseedResponse {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Idle,
    Busy,
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Cloud cost optimizer backend running" }))
}

/// Plain liveness answer kept for existing dashboards
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> ApiResult<impl IntoResponse> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    ))
}

async fn list_instances(State(state): State<Arc<AppState>>) -> Json<Vec<Resource>> {
    Json(state.store.list_resources().await)
}

async fn get_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ResourceId>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.store.get_resource(id).await?))
}

async fn instance_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ResourceId>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    // Distinguish an unknown resource from one with no history
    state.store.get_resource(id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Ok(Json(state.store.audit_for_resource(id, limit).await))
}

fn evaluate<R: CostRecord>(
    state: &AppState,
    source: &str,
    query: &EvaluateQuery,
    records: &[R],
) -> ApiResult<Vec<Recommendation>> {
    let engine = match query.threshold {
        Some(t) if !t.is_finite() || t < 0.0 => {
            return Err(CoreError::InvalidRecord {
                index: 0,
                reason: format!("threshold must be a non-negative number, got {}", t),
            }
            .into())
        }
        Some(t) => RecommendationEngine::with_threshold(t).with_mode(state.engine.mode()),
        None => state.engine.clone(),
    };
    let engine = if query.strict {
        engine.with_mode(EvaluationMode::Strict)
    } else {
        engine
    };

    match engine.evaluate(records) {
        Ok(recs) => {
            state.metrics.inc_recommendations(source, recs.len() as u64);
            state.logger.log_recommendations(source, records.len(), &recs);
            Ok(recs)
        }
        Err(e) => {
            state.metrics.inc_rejected_evaluations(source);
            Err(CoreError::from(e).into())
        }
    }
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EvaluateQuery>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let snapshot = state.store.list_resources().await;
    Ok(Json(evaluate(&state, "instances", &query, &snapshot)?))
}

async fn idle_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EvaluateQuery>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let snapshot = state.ledger.snapshot().await;
    Ok(Json(evaluate(&state, "usage", &query, &snapshot)?))
}

async fn apply(
    state: &AppState,
    id: ResourceId,
    transition: Transition,
    actor: Option<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let start = Instant::now();
    let actor = actor.as_deref();

    let result = match transition {
        Transition::Idle => state.store.make_idle(id, actor).await,
        Transition::Busy => state.store.make_busy(id, actor).await,
    };
    state.health_registry.observe(components::STORE, &result).await;

    match result {
        Ok((updated, audit)) => {
            state
                .metrics
                .observe_transition(&audit.action, start.elapsed().as_secs_f64());
            state
                .metrics
                .set_audit_entries(state.store.audit_len().await as i64);
            state.logger.log_transition(&audit);
            Ok(Json(TransitionResponse { updated, audit }))
        }
        Err(e) => {
            let action = match transition {
                Transition::Idle => cloudopt_lib::store::ACTION_MAKE_IDLE,
                Transition::Busy => cloudopt_lib::store::ACTION_MAKE_BUSY,
            };
            state.metrics.inc_transition_errors(e.kind());
            state.logger.log_transition_failed(id, action, &e.to_string());
            Err(e.into())
        }
    }
}

async fn make_idle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ResourceId>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<Json<TransitionResponse>> {
    apply(&state, id, Transition::Idle, query.actor).await
}

async fn make_busy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ResourceId>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<Json<TransitionResponse>> {
    apply(&state, id, Transition::Busy, query.actor).await
}

async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEntry>> {
    let order = match query.order {
        Some(OrderParam::Asc) => AuditOrder::Ascending,
        _ => AuditOrder::Descending,
    };
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Json(state.store.list_audit(limit, order).await)
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_recommendations(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let snapshot = state.store.list_resources().await;
    let recs = evaluate(&state, "instances", &EvaluateQuery::default(), &snapshot)?;
    let body = export::recommendations_csv(&recs)?;
    Ok(csv_attachment("recommendations.csv", body))
}

async fn export_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Response> {
    let limit = query.limit.unwrap_or(DEFAULT_EXPORT_LIMIT);
    let entries = state.store.list_audit(limit, AuditOrder::Descending).await;
    let body = export::audit_csv(&entries)?;
    Ok(csv_attachment("audit_log.csv", body))
}

async fn add_usage(
    State(state): State<Arc<AppState>>,
    Json(usage): Json<NewUsageRecord>,
) -> ApiResult<Json<UsageRecord>> {
    let result = state.ledger.add(usage).await;
    state
        .health_registry
        .observe(components::USAGE_LEDGER, &result)
        .await;

    let record = result?;
    state.metrics.set_usage_records(state.ledger.len().await as i64);
    Ok(Json(record))
}

async fn list_usages(State(state): State<Arc<AppState>>) -> Json<Vec<UsageRecord>> {
    Json(state.ledger.list().await)
}

async fn reseed(State(state): State<Arc<AppState>>) -> ApiResult<Json<ReseedResponse>> {
    let resources = state.reseed().await?;
    Ok(Json(ReseedResponse { resources }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/instances", get(list_instances))
        .route("/instances/:id", get(get_instance))
        .route("/instances/:id/audit", get(instance_audit))
        .route("/recommendations", get(recommendations))
        .route("/make_idle/:id", post(make_idle))
        .route("/make_busy/:id", post(make_busy))
        .route("/audit", get(list_audit))
        .route("/export/recommendations", get(export_recommendations))
        .route("/export/audit", get(export_audit))
        .route("/usage", post(add_usage))
        .route("/usages", get(list_usages))
        .route("/analysis/idle_recommendations", get(idle_recommendations))
        .route("/admin/reseed", post(reseed))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

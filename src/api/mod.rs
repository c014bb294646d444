use crate::adapters::ServiceStatus;
use crate::healthcheck::HealthReport;
use crate::metrics::{metrics_handler, MetricsService};
use crate::orchestrator::{BackendIntegrator, BackendResponse, Context, Entities};
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of the operations router
#[derive(Clone, FromRef)]
pub struct AppState {
    pub integrator: Arc<BackendIntegrator>,
    pub metrics: Option<MetricsService>,
}

/// Body of `POST /v1/backend/process`
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub intent: String,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Build the operations router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/backend/process", post(process_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Probe every backend now. 503 only when nothing is reachable.
async fn health_handler(
    State(integrator): State<Arc<BackendIntegrator>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = integrator.health_report().await;
    let status = match report.status {
        ServiceStatus::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ServiceStatus::Healthy | ServiceStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

async fn process_handler(
    State(integrator): State<Arc<BackendIntegrator>>,
    Json(request): Json<ProcessRequest>,
) -> Json<BackendResponse> {
    let response = integrator
        .process(
            &request.intent,
            &request.entities,
            &request.context,
            request.customer_id.as_deref(),
        )
        .await;
    Json(response)
}

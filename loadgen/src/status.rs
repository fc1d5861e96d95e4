//! Optional HTTP status endpoint
//!
//! - `GET /health`: liveness, current phase and uptime
//! - `GET /metrics`: JSON run counters
//! - `GET /metrics/prometheus`: Prometheus text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::scheduler::Phase;
use crate::stats::{RunStats, StatsSnapshot};

/// Shared state of the status routes
#[derive(Clone)]
pub struct StatusState {
    pub stats: Arc<RunStats>,
    pub phase: watch::Receiver<Phase>,
    pub prometheus: Option<PrometheusHandle>,
    pub started_at: Instant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    phase: Phase,
    uptime_seconds: u64,
}

async fn health(State(state): State<StatusState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        phase: *state.phase.borrow(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

async fn metrics(State(state): State<StatusState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

async fn prometheus_metrics(State(state): State<StatusState>) -> Response {
    match state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "Prometheus recorder not installed").into_response(),
    }
}

/// Build the status router
pub fn status_routes(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the status routes until `cancel` is raised
pub async fn serve(
    addr: SocketAddr,
    state: StatusState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status endpoint listening on {}", addr);

    axum::serve(listener, status_routes(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

//! Logging and metrics recorder setup

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::TelemetryError;

const DEFAULT_FILTER: &str = "mecha_loadgen=info";

/// How often buffered histogram samples are folded into their summaries
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init() -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

/// Install the Prometheus metrics recorder (must be done before any metrics are recorded)
pub fn install_prometheus() -> Result<PrometheusHandle, TelemetryError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Recorder(e.to_string()))
}

/// Periodically run recorder upkeep until the run is cancelled.
///
/// The recorder only drains histogram buffers on render or upkeep.
pub fn spawn_upkeep(
    handle: PrometheusHandle,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => handle.run_upkeep(),
            }
        }
    })
}

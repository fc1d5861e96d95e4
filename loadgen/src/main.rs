use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use mecha_loadgen::status::{self, StatusState};
use mecha_loadgen::{Config, GrpcClientService, LoadEngine, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let started_at = Instant::now();

    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus = telemetry::install_prometheus()?;

    // Initialize tracing
    telemetry::init()?;

    // Load configuration from environment
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Loaded configuration: frontend={}, groups={}, players={}",
        config.frontend_uri(),
        config.max_concurrent_groups,
        config.server_max_players
    );

    let service = GrpcClientService::connect_lazy(&config)?;
    let engine = LoadEngine::new(&config, Arc::new(service));
    let _signals = engine.coordinator().listen_for_signals();
    let _upkeep = telemetry::spawn_upkeep(
        prometheus.clone(),
        telemetry::UPKEEP_INTERVAL,
        engine.coordinator().token().clone(),
    );

    if let Some(addr) = &config.status_addr {
        let addr: SocketAddr = addr.parse()?;
        let state = StatusState {
            stats: engine.stats().clone(),
            phase: engine.phase(),
            prometheus: Some(prometheus),
            started_at,
        };
        let cancel = engine.coordinator().token().clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(addr, state, cancel).await {
                error!("Status endpoint failed: {}", e);
            }
        });
    }

    info!(
        "Simulating load: simulate={:?}, rest={:?}",
        config.phase.simulate_period, config.phase.rest_period
    );
    engine.run().await;

    Ok(())
}

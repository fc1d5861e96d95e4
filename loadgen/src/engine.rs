//! Wiring of the load generation engine

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::client::ClientService;
use crate::config::Config;
use crate::group::GroupSpawner;
use crate::pool::AdmissionPool;
use crate::runner::SessionRunner;
use crate::scheduler::{Phase, PhaseScheduler};
use crate::shutdown::ShutdownCoordinator;
use crate::stats::{RunStats, StatsSnapshot};

/// All components of one run, built from a single configuration value
pub struct LoadEngine {
    scheduler: PhaseScheduler,
    pool: AdmissionPool,
    coordinator: Arc<ShutdownCoordinator>,
    stats: Arc<RunStats>,
}

impl LoadEngine {
    pub fn new(config: &Config, service: Arc<dyn ClientService>) -> Self {
        let stats = Arc::new(RunStats::new());
        let pool = AdmissionPool::new(
            config.max_concurrent_groups,
            config.initial_token_delay,
            stats.clone(),
        );
        let runner = Arc::new(SessionRunner::new(
            service,
            config.player_properties.clone(),
            config.session,
            stats.clone(),
        ));
        let spawner = Arc::new(GroupSpawner::new(runner, config, stats.clone()));
        let scheduler = PhaseScheduler::new(pool.clone(), spawner, config.phase, stats.clone());

        Self {
            scheduler,
            pool,
            coordinator: Arc::new(ShutdownCoordinator::new(config.shutdown_grace)),
            stats,
        }
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    pub fn stats(&self) -> &Arc<RunStats> {
        &self.stats
    }

    pub fn pool(&self) -> &AdmissionPool {
        &self.pool
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.scheduler.subscribe()
    }

    /// Run until the cancellation signal is raised, then drain in-flight
    /// groups within the grace period and return the final counters.
    pub async fn run(&self) -> StatsSnapshot {
        let in_flight = self.scheduler.run(self.coordinator.token()).await;
        let aborted = self.coordinator.drain(in_flight).await;

        let snapshot = self.stats.snapshot();
        info!(
            groups_started = snapshot.groups_started,
            groups_completed = snapshot.groups_completed,
            groups_aborted = aborted,
            sessions_started = snapshot.sessions_started,
            sessions_matched = snapshot.sessions_matched,
            sessions_unmatched = snapshot.sessions_unmatched,
            sessions_failed = snapshot.sessions_failed,
            connection_failures = snapshot.connection_failures,
            rest_periods = snapshot.rest_periods,
            "Run summary"
        );
        snapshot
    }
}

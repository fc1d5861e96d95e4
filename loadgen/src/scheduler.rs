//! Phase scheduler: the top-level load shaping loop.
//!
//! The scheduler alternates between two phases:
//! - **Simulate**: take a token, launch a group, wait out the token's delay
//! - **Rest**: once `simulate_period` has elapsed, stay idle for `rest_period`
//!
//! It never waits for the groups it launched; the admission pool alone bounds
//! how many run at once. Every wait races the cancellation signal, and the
//! loop returns as soon as that signal is raised.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PhaseTimings;
use crate::group::GroupSpawner;
use crate::pool::AdmissionPool;
use crate::stats::RunStats;
use crate::wait::{Waited, sleep_or_cancel};

/// Current load shaping phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Simulate,
    Rest,
}

/// Groups launched by the scheduler that may still be running
pub type InFlightGroups = JoinSet<()>;

pub struct PhaseScheduler {
    pool: AdmissionPool,
    spawner: Arc<GroupSpawner>,
    timings: PhaseTimings,
    stats: Arc<RunStats>,
    phase: watch::Sender<Phase>,
}

impl PhaseScheduler {
    pub fn new(
        pool: AdmissionPool,
        spawner: Arc<GroupSpawner>,
        timings: PhaseTimings,
        stats: Arc<RunStats>,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Simulate);
        Self {
            pool,
            spawner,
            timings,
            stats,
            phase,
        }
    }

    /// Observe phase transitions
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run until cancellation and hand back the groups still in flight
    pub async fn run(&self, cancel: &CancellationToken) -> InFlightGroups {
        let mut groups = JoinSet::new();
        let mut phase_start = Instant::now();
        self.phase.send_replace(Phase::Simulate);

        loop {
            // Pull a token from the pool or stop on cancellation
            let Some(token) = self.pool.acquire(cancel).await else {
                info!(function = "spawnPlayerRequests", "shutdown requested");
                break;
            };
            let delay = token.delay();

            let spawner = self.spawner.clone();
            let pool = self.pool.clone();
            let group_cancel = cancel.clone();
            groups.spawn(async move {
                spawner.run(token, &pool, &group_cancel).await;
            });

            // Reap finished groups so the set does not grow over a long run
            while groups.try_join_next().is_some() {}

            if sleep_or_cancel(delay, cancel).await == Waited::Cancelled {
                info!(function = "spawnPlayerRequests", "shutdown requested");
                break;
            }
            info!(
                function = "spawnPlayerRequests",
                delay = ?delay,
                "request processed"
            );

            // Simulate requests for some time then rest to show load and no-load situations
            let elapsed = phase_start.elapsed();
            if elapsed >= self.timings.simulate_period {
                self.stats.rest_entered();
                self.phase.send_replace(Phase::Rest);
                info!(rest_period = ?self.timings.rest_period, "wait");

                if sleep_or_cancel(self.timings.rest_period, cancel).await == Waited::Cancelled {
                    info!(function = "spawnPlayerRequests", "shutdown requested");
                    break;
                }
                phase_start = Instant::now();
                self.phase.send_replace(Phase::Simulate);
                debug!("simulation resumed");
            } else {
                info!(
                    time = ?(self.timings.simulate_period - elapsed),
                    "simulation remaining"
                );
            }
        }

        groups
    }
}

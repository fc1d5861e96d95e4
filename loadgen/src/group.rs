//! Group spawner: one admission token turns into one batch of sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::pool::{AdmissionPool, AdmissionToken};
use crate::runner::{SessionOutcome, SessionRunner};
use crate::stats::RunStats;

/// Generate a fresh group identity
pub fn allocate_group_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4())
}

/// Session identities of a group: `{group}-{index}` for each index.
///
/// Members share the group identity so their log lines are easy to correlate.
pub fn session_ids(group_id: &str, players: usize) -> Vec<String> {
    (0..players).map(|i| format!("{}-{}", group_id, i)).collect()
}

/// Summary of one finished group
#[derive(Debug, Clone)]
pub struct GroupReport {
    pub group_id: String,
    pub outcomes: Vec<SessionOutcome>,
    /// Sessions whose task panicked instead of returning an outcome
    pub panicked: usize,
}

impl GroupReport {
    pub fn matched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.failed_stage.is_some())
            .count()
            + self.panicked
    }
}

/// Launches groups of concurrent sessions
pub struct GroupSpawner {
    runner: Arc<SessionRunner>,
    players: usize,
    id_prefix: String,
    recycle_delay: Duration,
    stats: Arc<RunStats>,
}

impl GroupSpawner {
    pub fn new(runner: Arc<SessionRunner>, config: &Config, stats: Arc<RunStats>) -> Self {
        Self {
            runner,
            players: config.server_max_players,
            id_prefix: config.player_id_prefix.clone(),
            recycle_delay: config.group_recycle_delay,
            stats,
        }
    }

    /// Run one group to completion and hand a replacement token back to `pool`.
    ///
    /// Sessions live in a `JoinSet` owned by this call, so none outlives it.
    pub async fn run(
        &self,
        token: AdmissionToken,
        pool: &AdmissionPool,
        cancel: &CancellationToken,
    ) -> GroupReport {
        let start = Instant::now();
        let group_id = allocate_group_id(&self.id_prefix);
        self.stats.group_started();

        let mut sessions = JoinSet::new();
        for id in session_ids(&group_id, self.players) {
            let runner = self.runner.clone();
            let cancel = cancel.clone();
            sessions.spawn(async move { runner.run(id, &cancel).await });
        }

        let mut report = GroupReport {
            group_id,
            outcomes: Vec::with_capacity(self.players),
            panicked: 0,
        };
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!(
                        function = "spawnPlayerRequests",
                        group = %report.group_id,
                        "Session task failed: {}", e
                    );
                    self.stats.session_failed("panic");
                    report.panicked += 1;
                }
            }
        }

        let elapsed = start.elapsed();
        self.stats.group_completed(elapsed);
        info!(
            function = "spawnPlayerRequests",
            group = %report.group_id,
            matched = report.matched(),
            failed = report.failed(),
            elapsed_ms = elapsed.as_millis() as u64,
            "group finished"
        );

        pool.release(token.recycle(self.recycle_delay));
        report
    }
}

//! Run counters
//!
//! Counters are kept as atomics for the run summary and the status endpoint,
//! and mirrored into the `metrics` facade for Prometheus.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every component of one run
#[derive(Debug, Default)]
pub struct RunStats {
    tokens_acquired: AtomicU64,
    tokens_released: AtomicU64,
    groups_started: AtomicU64,
    groups_completed: AtomicU64,
    groups_active: AtomicU64,
    peak_groups_active: AtomicU64,
    sessions_started: AtomicU64,
    sessions_matched: AtomicU64,
    sessions_unmatched: AtomicU64,
    sessions_failed: AtomicU64,
    deletes_attempted: AtomicU64,
    connection_failures: AtomicU64,
    rest_periods: AtomicU64,
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tokens_acquired: u64,
    pub tokens_released: u64,
    pub groups_started: u64,
    pub groups_completed: u64,
    pub groups_active: u64,
    pub peak_groups_active: u64,
    pub sessions_started: u64,
    pub sessions_matched: u64,
    pub sessions_unmatched: u64,
    pub sessions_failed: u64,
    pub deletes_attempted: u64,
    pub connection_failures: u64,
    pub rest_periods: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_acquired(&self) {
        self.tokens_acquired.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_tokens_acquired_total").increment(1);
    }

    pub fn token_released(&self) {
        self.tokens_released.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_tokens_released_total").increment(1);
    }

    pub fn group_started(&self) {
        self.groups_started.fetch_add(1, Ordering::SeqCst);
        let active = self.groups_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_groups_active.fetch_max(active, Ordering::SeqCst);
        counter!("loadgen_groups_started_total").increment(1);
        gauge!("loadgen_groups_active").set(active as f64);
    }

    pub fn group_completed(&self, elapsed: Duration) {
        self.groups_completed.fetch_add(1, Ordering::SeqCst);
        let active = self.groups_active.fetch_sub(1, Ordering::SeqCst) - 1;
        counter!("loadgen_groups_completed_total").increment(1);
        gauge!("loadgen_groups_active").set(active as f64);
        histogram!("loadgen_group_duration_seconds").record(elapsed);
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_sessions_started_total").increment(1);
    }

    pub fn session_matched(&self) {
        self.sessions_matched.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_sessions_matched_total").increment(1);
    }

    pub fn session_unmatched(&self) {
        self.sessions_unmatched.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_sessions_unmatched_total").increment(1);
    }

    pub fn session_failed(&self, stage: &'static str) {
        self.sessions_failed.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_sessions_failed_total", "stage" => stage).increment(1);
    }

    pub fn delete_attempted(&self) {
        self.deletes_attempted.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_deletes_attempted_total").increment(1);
    }

    pub fn connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_connection_failures_total").increment(1);
    }

    pub fn rest_entered(&self) {
        self.rest_periods.fetch_add(1, Ordering::SeqCst);
        counter!("loadgen_rest_periods_total").increment(1);
    }

    /// Record how long one lifecycle stage of a session took
    pub fn record_stage(&self, stage: &'static str, elapsed: Duration) {
        histogram!("loadgen_session_stage_duration_seconds", "stage" => stage).record(elapsed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tokens_acquired: self.tokens_acquired.load(Ordering::SeqCst),
            tokens_released: self.tokens_released.load(Ordering::SeqCst),
            groups_started: self.groups_started.load(Ordering::SeqCst),
            groups_completed: self.groups_completed.load(Ordering::SeqCst),
            groups_active: self.groups_active.load(Ordering::SeqCst),
            peak_groups_active: self.peak_groups_active.load(Ordering::SeqCst),
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            sessions_matched: self.sessions_matched.load(Ordering::SeqCst),
            sessions_unmatched: self.sessions_unmatched.load(Ordering::SeqCst),
            sessions_failed: self.sessions_failed.load(Ordering::SeqCst),
            deletes_attempted: self.deletes_attempted.load(Ordering::SeqCst),
            connection_failures: self.connection_failures.load(Ordering::SeqCst),
            rest_periods: self.rest_periods.load(Ordering::SeqCst),
        }
    }
}

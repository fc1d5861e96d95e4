//! Session runner: one simulated player's lifecycle against the frontend.
//!
//! register -> subscribe -> await result -> deregister -> cooldown
//!
//! Every failure is logged and ends only this session. Once registration
//! succeeded the session always tries to deregister, whether or not a result
//! arrived.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{ClientService, MatchResult, UpdateStream};
use crate::config::SessionTimings;
use crate::error::ClientError;
use crate::stats::RunStats;
use crate::wait::{Waited, sleep_or_cancel, until_cancelled};

/// Lifecycle stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Register,
    Subscribe,
    Await,
    Deregister,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Register => "register",
            Stage::Subscribe => "subscribe",
            Stage::Await => "await",
            Stage::Deregister => "deregister",
        }
    }
}

/// What happened to one session
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    pub id: String,
    /// First update delivered, if any arrived in time
    pub result: Option<MatchResult>,
    /// Stage whose call failed, if one did
    pub failed_stage: Option<Stage>,
    pub delete_attempted: bool,
    pub cancelled: bool,
}

/// Runs session lifecycles against a [`ClientService`]
pub struct SessionRunner {
    service: Arc<dyn ClientService>,
    properties: String,
    timings: SessionTimings,
    stats: Arc<RunStats>,
}

impl SessionRunner {
    pub fn new(
        service: Arc<dyn ClientService>,
        properties: impl Into<String>,
        timings: SessionTimings,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            service,
            properties: properties.into(),
            timings,
            stats,
        }
    }

    /// Drive one session to the end of its lifecycle
    pub async fn run(&self, id: String, cancel: &CancellationToken) -> SessionOutcome {
        self.stats.session_started();
        let mut outcome = SessionOutcome {
            id,
            ..Default::default()
        };

        if !self.register(&mut outcome, cancel).await {
            return outcome;
        }

        let result = self.await_result(&mut outcome, cancel).await;
        match &result {
            Some(_) => self.stats.session_matched(),
            None => self.stats.session_unmatched(),
        }
        info!(
            function = "waitForResults",
            id = %outcome.id,
            matched = result.is_some(),
            assignment = result.as_ref().and_then(|r| r.assignment.as_deref()).unwrap_or(""),
            "request processed"
        );
        outcome.result = result;

        if !self.deregister(&mut outcome, cancel).await {
            return outcome;
        }

        debug!(
            function = "cooldown",
            id = %outcome.id,
            duration = ?self.timings.server_timeout,
            "waiting"
        );
        if sleep_or_cancel(self.timings.server_timeout, cancel).await == Waited::Cancelled {
            outcome.cancelled = true;
        }
        outcome
    }

    /// Returns whether the session was registered
    async fn register(&self, outcome: &mut SessionOutcome, cancel: &CancellationToken) -> bool {
        let start = Instant::now();
        let created = until_cancelled(
            self.service.create_session(&outcome.id, &self.properties),
            cancel,
        )
        .await;
        self.stats.record_stage(Stage::Register.as_str(), start.elapsed());

        match created {
            None => {
                outcome.cancelled = true;
                false
            }
            Some(Ok(success)) => {
                info!(
                    function = "CreatePlayer",
                    id = %outcome.id,
                    result = success,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "request processed"
                );
                true
            }
            Some(Err(e)) => {
                error!(
                    function = "CreatePlayer",
                    id = %outcome.id,
                    err = %e,
                    "problem creating request"
                );
                self.fail(outcome, Stage::Register, &e);
                false
            }
        }
    }

    /// Subscribe and take the first update. Timeouts, end-of-stream and
    /// cancellation all yield `None`.
    async fn await_result(
        &self,
        outcome: &mut SessionOutcome,
        cancel: &CancellationToken,
    ) -> Option<MatchResult> {
        let start = Instant::now();
        let deadline = start + self.timings.failsafe_timeout;

        let opened = tokio::time::timeout_at(
            deadline,
            until_cancelled(
                self.service
                    .subscribe_updates(&outcome.id, self.timings.failsafe_timeout),
                cancel,
            ),
        )
        .await;
        self.stats.record_stage(Stage::Subscribe.as_str(), start.elapsed());

        let stream = match opened {
            Ok(Some(Ok(stream))) => stream,
            Ok(Some(Err(e))) => {
                error!(
                    function = "GetUpdates",
                    id = %outcome.id,
                    err = %e,
                    "problem updating request"
                );
                self.fail(outcome, Stage::Subscribe, &e);
                return None;
            }
            Ok(None) => {
                outcome.cancelled = true;
                return None;
            }
            Err(_) => {
                warn!(
                    function = "GetUpdates",
                    id = %outcome.id,
                    timeout = ?self.timings.failsafe_timeout,
                    "failsafe timeout opening stream"
                );
                return None;
            }
        };

        let waiting = Instant::now();
        let result = self.first_update(stream, deadline, outcome, cancel).await;
        self.stats.record_stage(Stage::Await.as_str(), waiting.elapsed());
        result
    }

    async fn first_update(
        &self,
        mut stream: UpdateStream,
        deadline: Instant,
        outcome: &mut SessionOutcome,
        cancel: &CancellationToken,
    ) -> Option<MatchResult> {
        match tokio::time::timeout_at(deadline, until_cancelled(stream.next(), cancel)).await {
            Ok(Some(Some(Ok(result)))) => Some(result),
            Ok(Some(Some(Err(e)))) => {
                warn!(
                    function = "waitForResults",
                    id = %outcome.id,
                    err = %e,
                    "problem reading stream"
                );
                None
            }
            Ok(Some(None)) => {
                info!(
                    function = "waitForResults",
                    id = %outcome.id,
                    "stream ended in EOF"
                );
                None
            }
            Ok(None) => {
                outcome.cancelled = true;
                None
            }
            Err(_) => {
                info!(
                    function = "waitForResults",
                    id = %outcome.id,
                    timeout = ?self.timings.failsafe_timeout,
                    "failsafe timeout waiting for result"
                );
                None
            }
        }
    }

    /// Returns whether the lifecycle should go on to the cooldown
    async fn deregister(&self, outcome: &mut SessionOutcome, cancel: &CancellationToken) -> bool {
        let start = Instant::now();
        outcome.delete_attempted = true;
        self.stats.delete_attempted();

        let deleted = until_cancelled(self.service.delete_session(&outcome.id), cancel).await;
        self.stats.record_stage(Stage::Deregister.as_str(), start.elapsed());

        match deleted {
            Some(Ok(success)) => {
                info!(
                    function = "DeletePlayer",
                    id = %outcome.id,
                    result = success,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "request processed"
                );
                !outcome.cancelled
            }
            Some(Err(e)) => {
                error!(
                    function = "DeletePlayer",
                    id = %outcome.id,
                    err = %e,
                    "problem deleting request"
                );
                self.fail(outcome, Stage::Deregister, &e);
                false
            }
            None => {
                debug!(function = "DeletePlayer", id = %outcome.id, "delete abandoned");
                outcome.cancelled = true;
                false
            }
        }
    }

    fn fail(&self, outcome: &mut SessionOutcome, stage: Stage, err: &ClientError) {
        if err.is_connection() {
            self.stats.connection_failure();
        }
        if outcome.failed_stage.is_none() {
            self.stats.session_failed(stage.as_str());
            outcome.failed_stage = Some(stage);
        }
    }
}

//! Shutdown coordinator: turns an external interrupt into the shared
//! cancellation signal and bounds how long exit waits for in-flight groups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::InFlightGroups;

pub struct ShutdownCoordinator {
    token: CancellationToken,
    raised: AtomicBool,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            raised: AtomicBool::new(false),
            grace,
        }
    }

    /// The process-wide cancellation signal
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Raise the cancellation signal. Only the first call logs.
    pub fn trigger(&self, reason: &str) {
        if !self.raised.swap(true, Ordering::SeqCst) {
            info!(function = "shutdown", reason, "sigterm");
        }
        self.token.cancel();
    }

    /// Spawn a task raising the signal on Ctrl-C (and SIGTERM on unix)
    pub fn listen_for_signals(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = coordinator.token.cancelled() => {}
                reason = wait_for_signal() => coordinator.trigger(reason),
            }
        })
    }

    /// Hold exit for the grace period while in-flight groups unwind, then
    /// abort whatever is still running.
    ///
    /// Returns how many groups had to be aborted.
    pub async fn drain(&self, mut groups: InFlightGroups) -> usize {
        let deadline = Instant::now() + self.grace;
        let drained = tokio::time::timeout_at(deadline, async {
            while groups.join_next().await.is_some() {}
        })
        .await;

        let remaining = groups.len();
        if drained.is_err() && remaining > 0 {
            warn!(
                remaining,
                grace = ?self.grace,
                "Aborting groups still running after grace period"
            );
            groups.shutdown().await;
        }
        // Leave the rest of the window for log and cleanup flushes
        tokio::time::sleep_until(deadline).await;
        remaining
    }
}

async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return "interrupt",
                    _ = terminate.recv() => return "terminate",
                }
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => "interrupt",
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending().await
        }
    }
}

//! Admission pool bounding how many groups run at once.
//!
//! The pool is a bounded queue pre-filled with `capacity` tokens. A group may
//! only start after taking a token and hands exactly one token back when it
//! is done, so the number of active groups can never exceed the capacity.
//! Tokens are minted only here and are not `Clone`; the replacement for a
//! consumed token comes from [`AdmissionToken::recycle`], which consumes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::stats::RunStats;

/// Permission for one more group to start
#[derive(Debug, PartialEq, Eq)]
pub struct AdmissionToken {
    delay: Duration,
}

impl AdmissionToken {
    /// Cooldown to wait after launching a group with this token
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Consume this token and produce its replacement carrying `delay`
    pub fn recycle(self, delay: Duration) -> AdmissionToken {
        AdmissionToken { delay }
    }
}

/// Fixed-capacity token queue shared by the scheduler and group spawners
#[derive(Clone)]
pub struct AdmissionPool {
    sender: mpsc::Sender<AdmissionToken>,
    // Waiters queue on the mutex, which is fair, so acquisition is FIFO
    receiver: Arc<Mutex<mpsc::Receiver<AdmissionToken>>>,
    stats: Arc<RunStats>,
}

impl AdmissionPool {
    /// Create a pool holding `capacity` tokens, each carrying `initial_delay`
    pub fn new(capacity: usize, initial_delay: Duration, stats: Arc<RunStats>) -> Self {
        assert!(capacity > 0, "admission pool capacity must be positive");
        let (sender, receiver) = mpsc::channel(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel was just created with room for every token
            let _ = sender.try_send(AdmissionToken {
                delay: initial_delay,
            });
        }

        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            stats,
        }
    }

    /// Wait for a token, or return `None` once cancellation is raised
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<AdmissionToken> {
        let token = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            token = async { self.receiver.lock().await.recv().await } => token,
        };

        if token.is_some() {
            self.stats.token_acquired();
        }
        token
    }

    /// Return a token to the pool
    pub fn release(&self, token: AdmissionToken) {
        match self.sender.try_send(token) {
            Ok(()) => self.stats.token_released(),
            // Only reachable if more tokens were returned than taken
            Err(e) => error!(
                function = "release",
                "Admission pool rejected a token: {}", e
            ),
        }
    }

    /// Total number of tokens in circulation
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Number of tokens currently waiting in the pool
    pub fn available(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

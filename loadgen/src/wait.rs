//! Racing a wait against the shared cancellation signal.
//!
//! Every suspension point of the engine goes through one of these helpers (or
//! a biased `tokio::select!` of its own), so a raised signal always wins over
//! a timer, a token or a response that happens to be ready at the same time.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a timed wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waited {
    Elapsed,
    Cancelled,
}

/// Sleep for `duration` unless cancellation fires first
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Waited {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Waited::Cancelled,
        _ = tokio::time::sleep(duration) => Waited::Elapsed,
    }
}

/// Drive `future` to completion unless cancellation fires first
pub async fn until_cancelled<F>(future: F, cancel: &CancellationToken) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

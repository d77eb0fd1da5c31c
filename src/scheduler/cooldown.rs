//! Interruptible waits used by the playback loop

use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// How a post-publish wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Skipped,
    Stopped,
}

/// Wait for `duration` (forever for `None`), a skip, or a stop.
///
/// The timer is dropped with the losing branches, so nothing outlives the
/// wait.
pub async fn cooldown(
    duration: Option<Duration>,
    skip: &Notify,
    stop: &CancellationToken,
) -> WaitOutcome {
    let timer = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = stop.cancelled() => WaitOutcome::Stopped,
        _ = skip.notified() => WaitOutcome::Skipped,
        _ = timer => WaitOutcome::Elapsed,
    }
}

/// Sleep for `duration` unless stopped first. Returns false when stopped.
pub async fn backoff(duration: Duration, stop: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

//! Cancellable polling and waiting
//!
//! Asynchronous completions on the CA and DNS provider side are awaited
//! through [`poll_until`], a small state machine with the states
//! pending, done, errored and canceled. Each pending step arms exactly one
//! timer, raced against the caller's [`CancellationToken`], so a cancel is
//! observed within one poll interval and never reported as "still pending".

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// The caller cancelled the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Outcome of a single status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Not terminal yet, check again after the interval
    Pending,
    /// Terminal value reached
    Ready(T),
}

enum PollState<T, E> {
    Pending,
    Done(T),
    Errored(E),
    Canceled,
}

/// Repeatedly run `check` every `interval` until it reports a terminal value
///
/// Errors returned by `check` end the loop immediately; they are never
/// treated as "not yet done".
pub async fn poll_until<T, E, F, Fut>(
    cancel: &CancellationToken,
    interval: Duration,
    mut check: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
    E: From<Cancelled>,
{
    let mut state = PollState::Pending;
    let mut attempt: u32 = 0;

    loop {
        state = match state {
            PollState::Pending => {
                attempt += 1;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PollState::Canceled,
                    _ = tokio::time::sleep(interval) => {
                        trace!(attempt, "Polling for completion");
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => PollState::Canceled,
                            result = check() => match result {
                                Ok(PollStatus::Pending) => PollState::Pending,
                                Ok(PollStatus::Ready(value)) => PollState::Done(value),
                                Err(e) => PollState::Errored(e),
                            },
                        }
                    }
                }
            }
            PollState::Done(value) => return Ok(value),
            PollState::Errored(e) => return Err(e),
            PollState::Canceled => return Err(Cancelled.into()),
        };
    }
}

/// Sleep for `duration` unless the caller cancels first
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Run a single request, abandoning it if the caller cancels
pub async fn cancellable<T, E, Fut>(cancel: &CancellationToken, request: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<Cancelled>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled.into()),
        result = request => result,
    }
}

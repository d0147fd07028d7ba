//! Single-use start barrier
//!
//! Participants call [`StartBarrier::arrive`] once they are staged and ready.
//! The last arrival (the *releaser*) wakes everyone; earlier arrivals wait
//! until release or until their timeout elapses, whichever comes first.
//!
//! The counter is guarded by a mutex so decrement-and-check is one critical
//! section. Release is published through a `watch` channel, which keeps the
//! released flag around for late subscribers, so a waiter that subscribes
//! after the releaser ran still observes the release.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{BenchError, BenchResult};

/// How an arrival left the barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// This arrival brought the count to zero and released everyone
    Releaser,
    /// Woken by the releaser
    Released,
    /// Timeout elapsed before all participants arrived
    TimedOut,
}

impl BarrierOutcome {
    /// Check if all participants had arrived when this call returned
    pub fn is_released(self) -> bool {
        !matches!(self, BarrierOutcome::TimedOut)
    }
}

/// Gates N participants until all have arrived or a timeout expires
pub struct StartBarrier {
    participants: usize,
    remaining: Mutex<usize>,
    released: watch::Sender<bool>,
}

impl StartBarrier {
    /// Create a barrier for `participants` arrivals
    ///
    /// # Errors
    /// Returns a configuration error if `participants` is zero.
    pub fn new(participants: usize) -> BenchResult<Self> {
        if participants == 0 {
            return Err(BenchError::config(
                "barrier needs at least one participant",
            ));
        }

        let (released, _) = watch::channel(false);
        Ok(Self {
            participants,
            remaining: Mutex::new(participants),
            released,
        })
    }

    /// Number of participants the barrier was created for
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Number of arrivals still missing
    pub fn remaining(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if the barrier has released
    pub fn is_released(&self) -> bool {
        *self.released.borrow()
    }

    /// Arrive and wait for the others
    ///
    /// `timeout` bounds the wait after this arrival is counted; `None` waits
    /// until release. A zero timeout never blocks.
    pub async fn arrive(&self, timeout: Option<Duration>) -> BarrierOutcome {
        let mut rx = self.released.subscribe();

        {
            let mut remaining = self
                .remaining
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *remaining {
                0 => {
                    tracing::warn!(
                        participants = self.participants,
                        "Arrival at a barrier that already released"
                    );
                    return BarrierOutcome::Released;
                }
                1 => {
                    *remaining = 0;
                    self.released.send_replace(true);
                    drop(remaining);
                    tracing::info!(
                        participants = self.participants,
                        "All participants ready, test begins"
                    );
                    return BarrierOutcome::Releaser;
                }
                _ => *remaining -= 1,
            }
        }

        let released = match timeout {
            Some(timeout) if timeout.is_zero() => *rx.borrow(),
            Some(timeout) => {
                let waited = tokio::time::timeout(timeout, rx.wait_for(|released| *released))
                    .await
                    .map(|result| result.is_ok());
                match waited {
                    Ok(released) => released,
                    // Release may have landed right as the timer fired
                    Err(_) => *rx.borrow(),
                }
            }
            None => rx.wait_for(|released| *released).await.is_ok(),
        };

        if released {
            BarrierOutcome::Released
        } else {
            BarrierOutcome::TimedOut
        }
    }

    /// Arrive and wait, reporting only whether release happened
    pub async fn arrive_and_wait(&self, timeout: Option<Duration>) -> bool {
        self.arrive(timeout).await.is_released()
    }
}

impl std::fmt::Debug for StartBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartBarrier")
            .field("participants", &self.participants)
            .field("remaining", &self.remaining())
            .finish()
    }
}

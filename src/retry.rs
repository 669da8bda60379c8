// src/retry.rs
//! Bounded retry of fetch → transform → classify for one invocation.
//!
//! States: `Pending` (next attempt allowed) → attempt → `Backoff` (soft
//! error, budget left) → `Pending` again, or `Done` with a terminal
//! classification. Shutdown cancels the fetch on the wire as well as the
//! back-off sleep; a cancelled invocation classifies nothing.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::classify::{classify, Classification};
use crate::error::{Cancelled, FetchError, HardErrorReason, SoftErrorReason};
use crate::fetch::{FetchResult, Fetcher};
use crate::shutdown::Shutdown;
use crate::watch::WatchDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `count + 1`.
    pub count: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: 3,
            delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub classification: Classification,
    pub attempts: u32,
}

enum State {
    Pending,
    Backoff(SoftErrorReason),
    Done(Classification),
}

#[derive(Clone)]
pub struct RetryController {
    fetcher: Arc<dyn Fetcher>,
    policy: RetryPolicy,
    limiter: Option<Arc<Semaphore>>,
}

impl RetryController {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            limiter: None,
        }
    }

    /// Cap the number of fetches in flight across all watches.
    pub fn with_fetch_limit(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run until a terminal classification.
    ///
    /// A terminal `SoftError` is only returned for watches with
    /// `skip_soft_error_escalation`; callers treat it as a non-event.
    pub async fn run(
        &self,
        watch: &WatchDefinition,
        shutdown: &Shutdown,
    ) -> Result<RunReport, Cancelled> {
        let max_attempts = self.policy.count.saturating_add(1);
        let mut attempts: u32 = 0;
        let mut state = State::Pending;

        loop {
            state = match state {
                State::Pending => {
                    if shutdown.is_triggered() {
                        return Err(Cancelled);
                    }
                    attempts += 1;
                    counter!("watch_fetch_attempts_total").increment(1);
                    let fetched = self.attempt(watch, shutdown).await?;
                    match classify(fetched, watch) {
                        Classification::SoftError(reason) if attempts < max_attempts => {
                            State::Backoff(reason)
                        }
                        Classification::SoftError(reason) => {
                            State::Done(self.escalate(watch, attempts, reason))
                        }
                        terminal => State::Done(terminal),
                    }
                }
                State::Backoff(reason) => {
                    warn!(
                        attempt = attempts,
                        max_attempts,
                        delay = ?self.policy.delay,
                        %reason,
                        "soft error, retrying"
                    );
                    shutdown.sleep(self.policy.delay).await?;
                    State::Pending
                }
                State::Done(classification) => {
                    return Ok(RunReport {
                        classification,
                        attempts,
                    })
                }
            };
        }
    }

    async fn attempt(
        &self,
        watch: &WatchDefinition,
        shutdown: &Shutdown,
    ) -> Result<Result<FetchResult, FetchError>, Cancelled> {
        let _permit = match &self.limiter {
            Some(sem) => {
                let acquire = sem.clone().acquire_owned();
                tokio::select! {
                    permit = acquire => permit.ok(),
                    _ = shutdown.wait() => return Err(Cancelled),
                }
            }
            None => None,
        };
        tokio::select! {
            res = self.fetcher.fetch(&watch.request) => Ok(res),
            _ = shutdown.wait() => {
                debug!("fetch abandoned on shutdown");
                Err(Cancelled)
            }
        }
    }

    fn escalate(
        &self,
        watch: &WatchDefinition,
        attempts: u32,
        reason: SoftErrorReason,
    ) -> Classification {
        if watch.skip_soft_error_escalation {
            debug!(attempts, %reason, "soft error escalation suppressed");
            Classification::SoftError(reason)
        } else {
            Classification::HardError(HardErrorReason::RetriesExhausted {
                attempts,
                last: reason,
            })
        }
    }
}

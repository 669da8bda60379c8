// src/pipeline.rs
//! One invocation of a watch: retry controller → diff → persist → notify.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{error, info, info_span, Instrument};

use crate::classify::Classification;
use crate::diff::{diff, DiffResult};
use crate::error::HardErrorReason;
use crate::notify::{Dispatcher, EventKind, NotificationEvent, NotificationOutcome};
use crate::retry::RetryController;
use crate::shutdown::Shutdown;
use crate::store::{Snapshot, SnapshotStore};
use crate::watch::WatchDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// First accepted content for this identity; stored, no alert.
    FirstRun,
    Unchanged,
    Changed,
    /// Hard error, reported through the notification channels.
    Failed,
    /// Soft errors outlasted the retry budget on a watch that opts out of
    /// escalation. Nothing is stored or sent.
    Suppressed,
    /// Tolerated error status; nothing is stored or sent.
    Exempt(u16),
    /// The snapshot store could not be read.
    StoreUnavailable,
    Cancelled,
}

impl InvocationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::FirstRun => "first_run",
            InvocationOutcome::Unchanged => "unchanged",
            InvocationOutcome::Changed => "changed",
            InvocationOutcome::Failed => "failed",
            InvocationOutcome::Suppressed => "suppressed",
            InvocationOutcome::Exempt(_) => "exempt",
            InvocationOutcome::StoreUnavailable => "store_unavailable",
            InvocationOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
pub struct InvocationReport {
    pub outcome: InvocationOutcome,
    pub attempts: u32,
    pub notifications: Vec<NotificationOutcome>,
}

impl InvocationReport {
    fn new(outcome: InvocationOutcome, attempts: u32) -> Self {
        Self {
            outcome,
            attempts,
            notifications: Vec::new(),
        }
    }
}

pub struct Pipeline {
    retry: RetryController,
    store: Arc<dyn SnapshotStore>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(retry: RetryController, store: Arc<dyn SnapshotStore>, dispatcher: Dispatcher) -> Self {
        Self {
            retry,
            store,
            dispatcher,
        }
    }

    pub async fn run(&self, watch: &WatchDefinition, shutdown: &Shutdown) -> InvocationReport {
        let span = info_span!("watch", name = %watch.id.name, url = %watch.id.url);
        let report = self.run_inner(watch, shutdown).instrument(span).await;
        counter!("watch_invocations_total", "outcome" => report.outcome.label()).increment(1);
        report
    }

    async fn run_inner(&self, watch: &WatchDefinition, shutdown: &Shutdown) -> InvocationReport {
        let run = match self.retry.run(watch, shutdown).await {
            Ok(run) => run,
            Err(_) => {
                info!("invocation cancelled before an attempt was classified");
                return InvocationReport::new(InvocationOutcome::Cancelled, 0);
            }
        };
        let attempts = run.attempts;

        match run.classification {
            Classification::Accepted(acc) => {
                if let Some(status) = acc.exempt_status {
                    info!(status, "ignoring exempt status code");
                    return InvocationReport::new(InvocationOutcome::Exempt(status), attempts);
                }

                let result = match diff(self.store.as_ref(), &watch.id, &acc.content).await {
                    Ok(d) => d,
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "snapshot lookup failed");
                        return InvocationReport::new(InvocationOutcome::StoreUnavailable, attempts);
                    }
                };

                // Persist before notifying; delivery failures never roll this back.
                let snapshot = Snapshot {
                    content: acc.content,
                    last_seen: Utc::now(),
                };
                if let Err(e) = self.store.put(&watch.id, snapshot).await {
                    error!(error = %format!("{e:#}"), "snapshot write failed");
                }

                match result {
                    DiffResult::Unchanged { first_run: true } => {
                        info!(attempts, "first run, snapshot stored");
                        InvocationReport::new(InvocationOutcome::FirstRun, attempts)
                    }
                    DiffResult::Unchanged { first_run: false } => {
                        info!(attempts, "no change");
                        InvocationReport::new(InvocationOutcome::Unchanged, attempts)
                    }
                    DiffResult::Changed(change) => {
                        info!(attempts, "change detected");
                        let ev = NotificationEvent {
                            watch: change.watch,
                            description: watch.description.clone(),
                            kind: EventKind::Changed {
                                old: change.old,
                                new: change.new,
                            },
                            ts: Utc::now(),
                        };
                        let notifications = self.dispatcher.dispatch(watch, &ev, shutdown).await;
                        InvocationReport {
                            outcome: InvocationOutcome::Changed,
                            attempts,
                            notifications,
                        }
                    }
                }
            }
            Classification::SoftError(reason) => {
                info!(attempts, %reason, "soft error not escalated");
                InvocationReport::new(InvocationOutcome::Suppressed, attempts)
            }
            Classification::HardError(reason) => {
                error!(attempts, %reason, "watch failed");
                let reason = match &reason {
                    HardErrorReason::Status { body, .. } if !body.is_empty() => {
                        format!("{reason}\n\n{body}")
                    }
                    _ => reason.to_string(),
                };
                let ev = NotificationEvent {
                    watch: watch.id.clone(),
                    description: watch.description.clone(),
                    kind: EventKind::Error { reason },
                    ts: Utc::now(),
                };
                let notifications = self.dispatcher.dispatch(watch, &ev, shutdown).await;
                InvocationReport {
                    outcome: InvocationOutcome::Failed,
                    attempts,
                    notifications,
                }
            }
        }
    }
}

// src/scheduler.rs
//! One timer task per enabled watch, held in an owned registry.
//!
//! Each timer owns at most one in-flight invocation. A trigger that fires
//! while that invocation is still running is skipped, never queued. On
//! shutdown timers stop immediately; in-flight invocations get until the
//! graceful deadline, after which their timer (and with it the invocation)
//! is aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::pipeline::{InvocationReport, Pipeline};
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::watch::{WatchDefinition, WatchId};

pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    timers: HashMap<WatchId, JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub finished: usize,
    pub aborted: usize,
}

/// Start one timer per enabled watch.
pub fn start(pipeline: Arc<Pipeline>, watches: Vec<Arc<WatchDefinition>>) -> SchedulerHandle {
    let (trigger, shutdown) = shutdown::channel();
    let mut timers = HashMap::with_capacity(watches.len());

    for watch in watches {
        if watch.disabled {
            debug!(watch = %watch.id, "disabled, not scheduled");
            continue;
        }
        let id = watch.id.clone();
        let handle = tokio::spawn(run_timer(pipeline.clone(), watch, shutdown.clone()));
        timers.insert(id, handle);
    }
    info!(timers = timers.len(), "scheduler started");

    SchedulerHandle {
        trigger,
        shutdown,
        timers,
    }
}

impl SchedulerHandle {
    pub fn watch_ids(&self) -> Vec<&WatchId> {
        let mut ids: Vec<&WatchId> = self.timers.keys().collect();
        ids.sort();
        ids
    }

    /// The signal handed to every timer and invocation.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop triggering and wait up to `graceful` for in-flight work.
    pub async fn shutdown(self, graceful: Duration) -> ShutdownReport {
        self.trigger.trigger();
        let deadline = Instant::now() + graceful;
        let mut report = ShutdownReport::default();

        for (id, mut handle) in self.timers {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => report.finished += 1,
                Err(_) => {
                    warn!(watch = %id, "graceful timeout reached, abandoning invocation");
                    handle.abort();
                    let _ = handle.await;
                    report.aborted += 1;
                }
            }
        }
        info!(
            finished = report.finished,
            aborted = report.aborted,
            "scheduler stopped"
        );
        report
    }
}

async fn run_timer(pipeline: Arc<Pipeline>, watch: Arc<WatchDefinition>, shutdown: Shutdown) {
    // Dropping the set (e.g. on abort) aborts the invocation too.
    let mut inflight: JoinSet<InvocationReport> = JoinSet::new();
    let mut cursor = Utc::now();

    loop {
        let Some(next) = watch.schedule.next_after(cursor) else {
            warn!(watch = %watch.id, "schedule has no upcoming fire time");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = shutdown.wait() => break,
            Some(joined) = inflight.join_next() => {
                log_finished(&watch.id, joined);
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }
        cursor = next.max(Utc::now());

        if !inflight.is_empty() {
            warn!(watch = %watch.id, "previous invocation still running, skipping trigger");
            counter!("watch_triggers_skipped_total").increment(1);
            continue;
        }

        let p = pipeline.clone();
        let w = watch.clone();
        let s = shutdown.clone();
        inflight.spawn(async move { p.run(&w, &s).await });
    }

    while let Some(joined) = inflight.join_next().await {
        log_finished(&watch.id, joined);
    }
}

fn log_finished(id: &WatchId, joined: Result<InvocationReport, JoinError>) {
    match joined {
        Ok(report) => debug!(
            watch = %id,
            outcome = report.outcome.label(),
            attempts = report.attempts,
            "invocation finished"
        ),
        Err(e) if e.is_panic() => error!(watch = %id, "invocation panicked"),
        Err(_) => debug!(watch = %id, "invocation aborted"),
    }
}

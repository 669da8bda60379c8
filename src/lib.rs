// src/lib.rs
// Library surface shared by the binary and the integration tests.

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod transform;
pub mod watch;

// ---- Re-exports ----
pub use crate::classify::{classify, Classification};
pub use crate::config::Settings;
pub use crate::pipeline::{InvocationOutcome, InvocationReport, Pipeline};
pub use crate::retry::{RetryController, RetryPolicy};
pub use crate::scheduler::SchedulerHandle;
pub use crate::store::{FileStore, MemoryStore, Snapshot, SnapshotStore};
pub use crate::watch::{WatchDefinition, WatchId};

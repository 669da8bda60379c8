// src/error.rs
//! Typed error taxonomy for one watch invocation.
//!
//! Transport problems and content soft errors are recovered by the retry
//! controller; everything that reaches [`HardErrorReason`] ends up in a
//! notification. Delivery failures are isolated per channel.

use thiserror::Error;

/// Transport-level failure of a single fetch. Never conflated with an HTTP
/// error status, which is a regular [`crate::fetch::FetchResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// Deterministic failure of the transform chain. Retrying cannot fix it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("jq query failed: {0}")]
    Jq(String),
}

/// Reasons a result is considered transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoftErrorReason {
    #[error("{0}")]
    Transport(String),
    #[error("content matched soft error pattern `{0}`")]
    Pattern(String),
}

/// Terminal failure of one invocation; eligible for an error notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardErrorReason {
    #[error("unexpected HTTP status {status}")]
    Status { status: u16, body: String },
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error("giving up after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: SoftErrorReason,
    },
}

/// Failure of one notification channel. Logged, never escalated.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("mail delivery failed: {0:#}")]
    Mail(anyhow::Error),
    #[error("webhook {url} failed: {source:#}")]
    Webhook {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("delivery cancelled by shutdown")]
    Cancelled,
}

/// Errors raised while loading or validating the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(String),
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Marker returned when an invocation stops because shutdown was signalled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invocation cancelled")]
pub struct Cancelled;

// src/classify.rs
//! Decides whether one attempt is accepted, transient, or a hard failure.

use crate::error::{FetchError, HardErrorReason, SoftErrorReason};
use crate::fetch::FetchResult;
use crate::watch::WatchDefinition;

/// Content accepted for diffing. `exempt_status` is set when the response had
/// an error status that the watch is configured to tolerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub content: String,
    pub status: u16,
    pub exempt_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Accepted(Accepted),
    SoftError(SoftErrorReason),
    HardError(HardErrorReason),
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Accepted(_) => "accepted",
            Classification::SoftError(_) => "soft_error",
            Classification::HardError(_) => "hard_error",
        }
    }
}

/// Error bodies are embedded in notifications; keep them short.
const MAX_ERROR_BODY: usize = 2_000;

/// Classify one fetch attempt, in order: transport failure, status, transform,
/// soft-error patterns.
pub fn classify(fetched: Result<FetchResult, FetchError>, watch: &WatchDefinition) -> Classification {
    let res = match fetched {
        Ok(res) => res,
        Err(e) => return Classification::SoftError(SoftErrorReason::Transport(e.to_string())),
    };

    let exempt_status = if res.is_success_status() {
        None
    } else if watch.exempt_statuses.contains(&res.status) {
        Some(res.status)
    } else {
        return Classification::HardError(HardErrorReason::Status {
            status: res.status,
            body: truncate(&String::from_utf8_lossy(&res.body), MAX_ERROR_BODY),
        });
    };

    // Exempt content is never diffed; a body the chain cannot handle (an HTML
    // error page under a jq watch) falls back to the raw text.
    let content = match (watch.transform.apply(&res.body), exempt_status) {
        (Ok(c), _) => c,
        (Err(_), Some(_)) => String::from_utf8_lossy(&res.body).into_owned(),
        (Err(e), None) => return Classification::HardError(HardErrorReason::Transform(e)),
    };

    if let Some(re) = watch.soft_error_patterns.iter().find(|re| re.is_match(&content)) {
        return Classification::SoftError(SoftErrorReason::Pattern(re.as_str().to_string()));
    }

    Classification::Accepted(Accepted {
        content,
        status: res.status,
        exempt_status,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

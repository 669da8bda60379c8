// src/watch.rs
//! Validated, immutable watch definitions shared by every pipeline stage.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::model::WebhookConfig;
use crate::schedule::Schedule;
use crate::transform::TransformChain;

/// Identity of a watch: the (name, url) pair, unique across the config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchId {
    pub name: String,
    pub url: String,
}

impl WatchId {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Stable hex digest, used as a storage key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Everything needed to issue one HTTP request for a watch.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Watch-level override; the fetcher falls back to its global default.
    pub useragent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchDefinition {
    pub id: WatchId,
    pub description: String,
    pub schedule: Schedule,
    pub request: RequestSpec,
    pub transform: TransformChain,
    /// Watch-level list if non-empty, else the global list.
    pub soft_error_patterns: Vec<Regex>,
    /// Terminal soft errors become non-events instead of hard errors.
    pub skip_soft_error_escalation: bool,
    /// Watch list merged with the global list.
    pub exempt_statuses: BTreeSet<u16>,
    pub additional_to: Vec<String>,
    pub webhooks: Vec<WebhookConfig>,
    pub disabled: bool,
}

impl WatchDefinition {
    /// Minimal GET definition, mostly for tests and one-off runs.
    pub fn simple(name: &str, url: &str) -> Self {
        Self {
            id: WatchId::new(name, url),
            description: String::new(),
            schedule: Schedule::Every(std::time::Duration::from_secs(3600)),
            request: RequestSpec {
                url: url.to_string(),
                method: "GET".to_string(),
                headers: BTreeMap::new(),
                body: None,
                useragent: None,
            },
            transform: TransformChain::default(),
            soft_error_patterns: Vec::new(),
            skip_soft_error_escalation: false,
            exempt_statuses: BTreeSet::new(),
            additional_to: Vec::new(),
            webhooks: Vec::new(),
            disabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_distinguishes_identities() {
        let a = WatchId::new("a", "https://example.com");
        let b = WatchId::new("a", "https://example.org");
        assert_eq!(a.digest(), WatchId::new("a", "https://example.com").digest());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}

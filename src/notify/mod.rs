// src/notify/mod.rs
//! Notification events and the delivery collaborators they are sent through.

pub mod dispatcher;
pub mod email;
pub mod webhook;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::model::WebhookConfig;
use crate::watch::WatchId;

pub use dispatcher::{Channel, Dispatcher, MailChannel, NotificationOutcome};

const SUBJECT_PREFIX: &str = "[web-watcher]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Changed { old: String, new: String },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub watch: WatchId,
    pub description: String,
    pub kind: EventKind,
    pub ts: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn subject(&self) -> String {
        match self.kind {
            EventKind::Changed { .. } => {
                format!("{SUBJECT_PREFIX} Detected change on {}", self.watch.name)
            }
            EventKind::Error { .. } => format!("{SUBJECT_PREFIX} Error on {}", self.watch.name),
        }
    }

    /// Plain-text mail body. Old and new content are passed through verbatim;
    /// rendering a line diff is left to the reader's mail client or tooling.
    pub fn text_body(&self) -> String {
        let mut out = format!("Name: {}\nURL: {}\n", self.watch.name, self.watch.url);
        if !self.description.is_empty() {
            out.push_str(&format!("Description: {}\n", self.description));
        }
        out.push_str(&format!("Time: {}\n\n", self.ts.to_rfc3339()));
        match &self.kind {
            EventKind::Changed { old, new } => {
                out.push_str("--- previous content ---\n");
                out.push_str(old);
                out.push_str("\n\n--- new content ---\n");
                out.push_str(new);
                out.push('\n');
            }
            EventKind::Error { reason } => {
                out.push_str("Error: ");
                out.push_str(reason);
                out.push('\n');
            }
        }
        out
    }

    pub fn webhook_payload(&self) -> WebhookPayload {
        let (kind, old, new, error) = match &self.kind {
            EventKind::Changed { old, new } => ("change", Some(old.clone()), Some(new.clone()), None),
            EventKind::Error { reason } => ("error", None, None, Some(reason.clone())),
        };
        WebhookPayload {
            name: self.watch.name.clone(),
            url: self.watch.url.clone(),
            description: self.description.clone(),
            kind,
            old,
            new,
            error,
            timestamp: self.ts,
        }
    }
}

/// JSON body posted to webhooks.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub name: String,
    pub url: String,
    pub description: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Mail collaborator. Retry policy is owned by the dispatcher.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Webhook collaborator; one call is one delivery attempt.
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn invoke(&self, hook: &WebhookConfig, payload: &WebhookPayload) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(kind: EventKind) -> NotificationEvent {
        NotificationEvent {
            watch: WatchId::new("prices", "https://example.com/p"),
            description: "price page".into(),
            kind,
            ts: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn subjects_name_the_watch() {
        let changed = event(EventKind::Changed {
            old: "a".into(),
            new: "b".into(),
        });
        assert_eq!(changed.subject(), "[web-watcher] Detected change on prices");
        let failed = event(EventKind::Error {
            reason: "unexpected HTTP status 500".into(),
        });
        assert_eq!(failed.subject(), "[web-watcher] Error on prices");
        assert!(failed.text_body().contains("Error: unexpected HTTP status 500"));
    }

    #[test]
    fn webhook_payload_omits_unused_fields() {
        let payload = event(EventKind::Changed {
            old: "a".into(),
            new: "b".into(),
        })
        .webhook_payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "change");
        assert_eq!(json["old"], "a");
        assert_eq!(json["new"], "b");
        assert!(json.get("error").is_none());
    }
}

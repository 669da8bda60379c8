// src/notify/dispatcher.rs
//! Fans one event out to mail and webhooks. Channels are independent: a
//! failure on one never blocks or fails another.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{MailTransport, NotificationEvent, WebhookTransport};
use crate::error::NotifyError;
use crate::shutdown::Shutdown;
use crate::watch::WatchDefinition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Mail,
    Webhook(String),
}

/// Per-channel delivery record, kept only for logging and tests.
#[derive(Debug)]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub attempts: u32,
    pub result: Result<(), NotifyError>,
}

impl NotificationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Mail transport plus the base recipients and retry policy.
#[derive(Clone)]
pub struct MailChannel {
    pub transport: Arc<dyn MailTransport>,
    pub to: Vec<String>,
    /// Total attempts, at least one.
    pub attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Clone)]
pub struct Dispatcher {
    mail: Option<MailChannel>,
    webhook: Arc<dyn WebhookTransport>,
}

impl Dispatcher {
    pub fn new(mail: Option<MailChannel>, webhook: Arc<dyn WebhookTransport>) -> Self {
        Self { mail, webhook }
    }

    pub async fn dispatch(
        &self,
        watch: &WatchDefinition,
        ev: &NotificationEvent,
        shutdown: &Shutdown,
    ) -> Vec<NotificationOutcome> {
        let (mail, hooks) = tokio::join!(
            self.send_mail(watch, ev, shutdown),
            self.send_webhooks(watch, ev)
        );

        let mut outcomes: Vec<NotificationOutcome> = mail.into_iter().collect();
        outcomes.extend(hooks);

        if !outcomes.is_empty() && outcomes.iter().all(|o| !o.is_ok()) {
            warn!(watch = %ev.watch.name, "notification failed on every channel");
        }
        outcomes
    }

    async fn send_mail(
        &self,
        watch: &WatchDefinition,
        ev: &NotificationEvent,
        shutdown: &Shutdown,
    ) -> Option<NotificationOutcome> {
        let channel = self.mail.as_ref()?;

        let mut recipients = channel.to.clone();
        for extra in &watch.additional_to {
            if !recipients.contains(extra) {
                recipients.push(extra.clone());
            }
        }

        let subject = ev.subject();
        let body = ev.text_body();
        let max = channel.attempts.max(1);
        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            match channel.transport.send(&recipients, &subject, &body).await {
                Ok(()) => break Ok(()),
                Err(e) if attempt < max => {
                    warn!(watch = %ev.watch.name, attempt, max, error = %format!("{e:#}"), "mail delivery failed, retrying");
                    if shutdown.sleep(channel.retry_delay).await.is_err() {
                        break Err(NotifyError::Cancelled);
                    }
                }
                Err(e) => break Err(NotifyError::Mail(e)),
            }
        };

        record("mail", &result);
        match &result {
            Ok(()) => info!(watch = %ev.watch.name, recipients = recipients.len(), "mail sent"),
            Err(e) => warn!(watch = %ev.watch.name, attempts = attempt, error = %e, "mail delivery gave up"),
        }
        Some(NotificationOutcome {
            channel: Channel::Mail,
            attempts: attempt,
            result,
        })
    }

    /// One attempt per webhook, no retry. Hooks run concurrently; outcomes
    /// keep the configured order.
    async fn send_webhooks(
        &self,
        watch: &WatchDefinition,
        ev: &NotificationEvent,
    ) -> Vec<NotificationOutcome> {
        if watch.webhooks.is_empty() {
            return Vec::new();
        }
        let payload = Arc::new(ev.webhook_payload());

        // Dropping the set aborts any hook still running.
        let mut set = JoinSet::new();
        for (idx, hook) in watch.webhooks.iter().cloned().enumerate() {
            let transport = Arc::clone(&self.webhook);
            let payload = Arc::clone(&payload);
            set.spawn(async move {
                let result = transport.invoke(&hook, &payload).await;
                (idx, hook.url, result)
            });
        }

        let mut slots: Vec<Option<NotificationOutcome>> =
            watch.webhooks.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (idx, url, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(watch = %ev.watch.name, error = %e, "webhook task failed");
                    continue;
                }
            };
            let result = result.map_err(|source| NotifyError::Webhook {
                url: url.clone(),
                source,
            });
            record("webhook", &result);
            if let Err(e) = &result {
                warn!(watch = %ev.watch.name, error = %e, "webhook delivery failed");
            }
            slots[idx] = Some(NotificationOutcome {
                channel: Channel::Webhook(url),
                attempts: 1,
                result,
            });
        }

        // A panicked hook task still counts as a failed delivery.
        slots
            .into_iter()
            .zip(&watch.webhooks)
            .map(|(slot, hook)| {
                slot.unwrap_or_else(|| {
                    let result = Err(NotifyError::Webhook {
                        url: hook.url.clone(),
                        source: anyhow::anyhow!("webhook task did not complete"),
                    });
                    record("webhook", &result);
                    NotificationOutcome {
                        channel: Channel::Webhook(hook.url.clone()),
                        attempts: 1,
                        result,
                    }
                })
            })
            .collect()
    }
}

fn record(channel: &'static str, result: &Result<(), NotifyError>) {
    let status = if result.is_ok() { "ok" } else { "error" };
    counter!("notify_deliveries_total", "channel" => channel, "result" => status).increment(1);
}

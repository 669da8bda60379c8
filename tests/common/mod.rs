// tests/common/mod.rs
// In-process fakes for the fetch and delivery collaborators.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use web_watcher::config::WebhookConfig;
use web_watcher::error::FetchError;
use web_watcher::fetch::{FetchResult, Fetcher};
use web_watcher::notify::{
    Dispatcher, MailChannel, MailTransport, WebhookPayload, WebhookTransport,
};
use web_watcher::watch::RequestSpec;

pub fn ok(status: u16, body: &str) -> Result<FetchResult, FetchError> {
    Ok(FetchResult {
        status,
        body: body.as_bytes().to_vec(),
        headers: BTreeMap::new(),
        elapsed: Duration::from_millis(1),
    })
}

pub fn transport(msg: &str) -> Result<FetchResult, FetchError> {
    Err(FetchError::Transport(msg.to_string()))
}

/// Replays scripted replies in order; the last one repeats once the script
/// runs out.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchResult, FetchError>>>,
    last: Mutex<Option<Result<FetchResult, FetchError>>>,
    delay: Duration,
    calls: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<FetchResult, FetchError>>) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    pub fn with_delay(script: Vec<Result<FetchResult, FetchError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _req: &RequestSpec) -> Result<FetchResult, FetchError> {
        self.calls.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = {
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(r) => {
                    *last = Some(r.clone());
                    r
                }
                None => last.clone().unwrap_or_else(|| transport("script exhausted")),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Records every mail; fails the first `fail_first` sends.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    attempts: AtomicUsize,
    fail_first: usize,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            ..Self::default()
        })
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(anyhow!("smtp unavailable"));
        }
        self.sent.lock().unwrap().push(SentMail {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Records payloads; hooks whose URL contains "fail" return an error.
#[derive(Default)]
pub struct RecordingWebhook {
    pub delivered: Mutex<Vec<(String, serde_json::Value)>>,
    attempts: AtomicUsize,
    delay: Duration,
}

impl RecordingWebhook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every invocation sleeps `delay` before answering.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn delivered(&self) -> Vec<(String, serde_json::Value)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn invoke(&self, hook: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if hook.url.contains("fail") {
            return Err(anyhow!("connection refused"));
        }
        let value = serde_json::to_value(payload)?;
        self.delivered.lock().unwrap().push((hook.url.clone(), value));
        Ok(())
    }
}

pub fn webhook(url: &str) -> WebhookConfig {
    WebhookConfig {
        url: url.to_string(),
        method: "POST".to_string(),
        header: BTreeMap::new(),
        useragent: None,
    }
}

pub fn dispatcher(
    mailer: Arc<RecordingMailer>,
    attempts: u32,
    hooks: Arc<RecordingWebhook>,
) -> Dispatcher {
    Dispatcher::new(
        Some(MailChannel {
            transport: mailer,
            to: vec!["ops@example.com".to_string()],
            attempts,
            retry_delay: Duration::from_millis(10),
        }),
        hooks,
    )
}

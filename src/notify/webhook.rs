// src/notify/webhook.rs
use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};

use super::{WebhookPayload, WebhookTransport};
use crate::config::model::{WebhookConfig, DEFAULT_USERAGENT};

pub struct HttpWebhook {
    client: Client,
    default_useragent: String,
}

impl HttpWebhook {
    pub fn new(client: Client, useragent: &str) -> Self {
        let default_useragent = if useragent.trim().is_empty() {
            DEFAULT_USERAGENT.to_string()
        } else {
            useragent.to_string()
        };
        Self {
            client,
            default_useragent,
        }
    }
}

#[async_trait::async_trait]
impl WebhookTransport for HttpWebhook {
    async fn invoke(&self, hook: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
        let method = Method::from_bytes(hook.method.as_bytes())
            .with_context(|| format!("invalid webhook method {}", hook.method))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.default_useragent).context("invalid useragent")?,
        );
        for (k, v) in &hook.header {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name {k}"))?;
            let value = HeaderValue::from_str(v)
                .with_context(|| format!("invalid header value for {k}"))?;
            headers.insert(name, value);
        }
        // An explicit useragent beats a User-Agent entry in the header map.
        if let Some(ua) = hook.useragent.as_deref() {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(ua).context("invalid useragent")?,
            );
        }

        let resp = self
            .client
            .request(method, &hook.url)
            .headers(headers)
            .json(payload)
            .send()
            .await
            .context("webhook request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("webhook answered {status}");
        }
        Ok(())
    }
}

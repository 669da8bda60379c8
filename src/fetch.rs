// src/fetch.rs
//! One HTTP request per attempt. Retry policy lives in [`crate::retry`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, NoProxy, Proxy};

use crate::config::model::{ProxyConfig, DEFAULT_USERAGENT};
use crate::error::FetchError;
use crate::watch::RequestSpec;

/// Outcome of a request that reached the server, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub elapsed: Duration,
}

impl FetchResult {
    pub fn is_success_status(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &RequestSpec) -> Result<FetchResult, FetchError>;
}

/// `reqwest`-backed fetcher. The client (pool, proxy) is shared by all watches.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    default_useragent: String,
}

/// Shared client with request timeout and optional proxy routing.
pub fn build_client(timeout: Duration, proxy: Option<&ProxyConfig>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(p) = proxy {
        builder = builder.proxy(build_proxy(p)?);
    }
    builder.build().context("building http client")
}

impl HttpFetcher {
    pub fn new(useragent: &str, timeout: Duration, proxy: Option<&ProxyConfig>) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout, proxy)?, useragent))
    }

    pub fn with_client(client: Client, useragent: &str) -> Self {
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

    fn build_request(&self, req: &RequestSpec) -> Result<reqwest::RequestBuilder, FetchError> {
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|e| FetchError::Transport(format!("invalid method {}: {e}", req.method)))?;

        let mut headers = HeaderMap::new();
        for (k, v) in &req.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| FetchError::Transport(format!("invalid header name {k}: {e}")))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| FetchError::Transport(format!("invalid header value for {k}: {e}")))?;
            headers.insert(name, value);
        }
        match req.useragent.as_deref() {
            Some(ua) => {
                let ua = HeaderValue::from_str(ua)
                    .map_err(|e| FetchError::Transport(format!("invalid useragent: {e}")))?;
                headers.insert(USER_AGENT, ua);
            }
            None if !headers.contains_key(USER_AGENT) => {
                let ua = HeaderValue::from_str(&self.default_useragent)
                    .map_err(|e| FetchError::Transport(format!("invalid useragent: {e}")))?;
                headers.insert(USER_AGENT, ua);
            }
            None => {}
        }

        let mut builder = self.client.request(method, &req.url).headers(headers);
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

fn build_proxy(cfg: &ProxyConfig) -> Result<Proxy> {
    let mut proxy = Proxy::all(&cfg.url).with_context(|| format!("invalid proxy url {}", cfg.url))?;
    if let (Some(user), Some(pass)) = (cfg.username.as_deref(), cfg.password.as_deref()) {
        if !user.is_empty() {
            proxy = proxy.basic_auth(user, pass);
        }
    }
    if let Some(list) = cfg.no_proxy.as_deref() {
        proxy = proxy.no_proxy(NoProxy::from_string(list));
    }
    Ok(proxy)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &RequestSpec) -> Result<FetchResult, FetchError> {
        let request = self.build_request(req)?;
        let t0 = Instant::now();

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe(&e)))?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(describe(&e)))?
            .to_vec();

        let elapsed = t0.elapsed();
        histogram!("watch_fetch_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);
        tracing::debug!(url = %req.url, status, bytes = body.len(), ?elapsed, "fetched");

        Ok(FetchResult {
            status,
            body,
            headers,
            elapsed,
        })
    }
}

/// Full source chain; reqwest's top-level message alone hides the root cause.
fn describe(e: &reqwest::Error) -> String {
    use std::error::Error as _;

    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    if e.is_timeout() {
        msg.push_str(" (timeout)");
    }
    msg
}

// src/config/model.rs
//! Raw configuration as it appears on disk, before validation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_USERAGENT: &str = "web-watcher / https://github.com/web-watcher/web-watcher";
pub const DEFAULT_SCHEDULE: &str = "@hourly";
pub const DEFAULT_SNAPSHOT_DIR: &str = "state/snapshots";

/// Humantime (de)serialization for `Duration` fields, e.g. `"3s"` or `"1m 30s"`.
pub mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_useragent")]
    pub useragent: String,
    #[serde(default = "default_timeout", with = "duration_str")]
    pub timeout: Duration,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default)]
    pub no_errormail_on_statuscode: Vec<u16>,
    #[serde(default)]
    pub retry_on_match: Vec<String>,
    #[serde(default = "default_graceful_timeout", with = "duration_str")]
    pub graceful_timeout: Duration,
    /// IANA timezone used for schedules without their own `CRON_TZ=`.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
    /// Address for the Prometheus `/metrics` endpoint, e.g. `127.0.0.1:9187`.
    #[serde(default)]
    pub metrics_listen: Option<String>,
    #[serde(default)]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub no_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailFrom {
    pub name: String,
    pub mail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub from: MailFrom,
    pub to: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// `"ENV"` reads the password from `WEB_WATCHER_SMTP_PASSWORD`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default)]
    pub skiptls: bool,
    #[serde(default = "default_mail_retries")]
    pub retries: u32,
    #[serde(default = "default_mail_retry_delay", with = "duration_str")]
    pub retry_delay: Duration,
    #[serde(default = "default_mail_timeout", with = "duration_str")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub count: u32,
    #[serde(with = "duration_str")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            count: 3,
            delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default)]
    pub cron: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default)]
    pub additional_to: Vec<String>,
    #[serde(default)]
    pub no_errormail_on_statuscode: Vec<u16>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub replaces: Vec<ReplaceConfig>,
    #[serde(default)]
    pub retry_on_match: Vec<String>,
    #[serde(default)]
    pub skip_soft_error_patterns: bool,
    #[serde(default)]
    pub jq: Option<String>,
    #[serde(default)]
    pub extract_body: bool,
    #[serde(default)]
    pub useragent: Option<String>,
    #[serde(default)]
    pub remove_empty_lines: bool,
    #[serde(default)]
    pub trim_whitespace: bool,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_webhook_method")]
    pub method: String,
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default)]
    pub useragent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceConfig {
    pub pattern: String,
    #[serde(default)]
    pub replace_with: String,
}

fn default_useragent() -> String {
    DEFAULT_USERAGENT.to_string()
}
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_snapshot_dir() -> String {
    DEFAULT_SNAPSHOT_DIR.to_string()
}
fn default_graceful_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_mail_retries() -> u32 {
    3
}
fn default_mail_retry_delay() -> Duration {
    Duration::from_secs(5)
}
fn default_mail_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_webhook_method() -> String {
    "POST".to_string()
}

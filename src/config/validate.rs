// src/config/validate.rs
//! Turns a raw [`Configuration`] into immutable runtime [`Settings`].
//!
//! All problems are collected and reported together so a broken config can
//! be fixed in one pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use lettre::Address;
use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue};

use crate::config::model::{
    Configuration, MailConfig, ProxyConfig, WatchConfig, DEFAULT_SCHEDULE,
};
use crate::error::ConfigError;
use crate::schedule::{parse_tz, Schedule};
use crate::transform::{TransformChain, TransformOptions};
use crate::watch::{RequestSpec, WatchDefinition, WatchId};

const WEBHOOK_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Global settings plus validated watch definitions.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mail: Option<MailConfig>,
    pub proxy: Option<ProxyConfig>,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub useragent: String,
    pub timeout: Duration,
    pub snapshot_dir: String,
    pub graceful_timeout: Duration,
    pub location: Tz,
    pub max_concurrent_fetches: Option<usize>,
    pub metrics_listen: Option<String>,
    pub watches: Vec<Arc<WatchDefinition>>,
}

impl Settings {
    pub fn enabled_watches(&self) -> Vec<Arc<WatchDefinition>> {
        self.watches.iter().filter(|w| !w.disabled).cloned().collect()
    }
}

pub fn validate(cfg: Configuration) -> Result<Settings, ConfigError> {
    let mut errs: Vec<String> = Vec::new();

    let location = match cfg.location.as_deref() {
        Some(name) if !name.trim().is_empty() => parse_tz(name).unwrap_or_else(|e| {
            errs.push(format!("location: {e}"));
            Tz::UTC
        }),
        _ => Tz::UTC,
    };

    if let Some(mail) = &cfg.mail {
        validate_mail(mail, &mut errs);
    }
    if let Some(proxy) = &cfg.proxy {
        validate_proxy(proxy, &mut errs);
    }
    validate_statuses("no_errormail_on_statuscode", &cfg.no_errormail_on_statuscode, &mut errs);
    check_useragent("useragent", Some(cfg.useragent.as_str()), &mut errs);
    if cfg.max_concurrent_fetches == Some(0) {
        errs.push("max_concurrent_fetches must be greater than zero".to_string());
    }

    let global_soft = compile_patterns("retry_on_match", &cfg.retry_on_match, &mut errs);
    let global_exempt: BTreeSet<u16> = cfg.no_errormail_on_statuscode.iter().copied().collect();

    let mut seen: HashSet<WatchId> = HashSet::new();
    let mut watches = Vec::with_capacity(cfg.watches.len());
    for (idx, wc) in cfg.watches.iter().enumerate() {
        let label = if wc.name.trim().is_empty() {
            format!("watches[{idx}]")
        } else {
            format!("watch `{}`", wc.name)
        };
        let id = WatchId::new(wc.name.clone(), wc.url.clone());
        if !seen.insert(id) {
            errs.push(format!(
                "{label}: name and url combinations need to be unique"
            ));
        }
        if let Some(def) =
            validate_watch(wc, &label, location, &global_soft, &global_exempt, &mut errs)
        {
            watches.push(Arc::new(def));
        }
    }

    if !errs.is_empty() {
        return Err(ConfigError::Invalid(errs));
    }

    Ok(Settings {
        mail: cfg.mail,
        proxy: cfg.proxy,
        retry_count: cfg.retry.count,
        retry_delay: cfg.retry.delay,
        useragent: cfg.useragent,
        timeout: cfg.timeout,
        snapshot_dir: cfg.snapshot_dir,
        graceful_timeout: cfg.graceful_timeout,
        location,
        max_concurrent_fetches: cfg.max_concurrent_fetches,
        metrics_listen: cfg.metrics_listen,
        watches,
    })
}

fn validate_watch(
    wc: &WatchConfig,
    label: &str,
    location: Tz,
    global_soft: &[Regex],
    global_exempt: &BTreeSet<u16>,
    errs: &mut Vec<String>,
) -> Option<WatchDefinition> {
    let before = errs.len();

    if wc.name.trim().is_empty() {
        errs.push(format!("{label}: name is required"));
    }
    check_http_url(label, "url", &wc.url, errs);
    check_headers(label, &wc.header, errs);
    check_useragent(&format!("{label}: useragent"), wc.useragent.as_deref(), errs);

    let method = wc.method.clone().unwrap_or_else(|| "GET".to_string());
    if method.is_empty() || method != method.to_ascii_uppercase() {
        errs.push(format!("{label}: method `{method}` must be uppercase"));
    } else if reqwest::Method::from_bytes(method.as_bytes()).is_err() {
        errs.push(format!("{label}: invalid method `{method}`"));
    }

    let cron = wc.cron.as_deref().unwrap_or(DEFAULT_SCHEDULE);
    let schedule = Schedule::parse(cron, location)
        .map_err(|e| errs.push(format!("{label}: {e}")))
        .ok();

    let transform = TransformChain::compile(&TransformOptions {
        jq: wc.jq.clone().filter(|q| !q.trim().is_empty()),
        extract_body: wc.extract_body,
        pattern: wc.pattern.clone().filter(|p| !p.is_empty()),
        replaces: wc
            .replaces
            .iter()
            .map(|r| (r.pattern.clone(), r.replace_with.clone()))
            .collect(),
        remove_empty_lines: wc.remove_empty_lines,
        trim_whitespace: wc.trim_whitespace,
    })
    .map_err(|list| {
        for e in list {
            errs.push(format!("{label}: {e}"));
        }
    })
    .ok();

    let soft_error_patterns = if wc.retry_on_match.is_empty() {
        global_soft.to_vec()
    } else {
        compile_patterns(&format!("{label}: retry_on_match"), &wc.retry_on_match, errs)
    };

    validate_statuses(
        &format!("{label}: no_errormail_on_statuscode"),
        &wc.no_errormail_on_statuscode,
        errs,
    );
    let mut exempt_statuses = global_exempt.clone();
    exempt_statuses.extend(wc.no_errormail_on_statuscode.iter().copied());

    for addr in &wc.additional_to {
        check_address(&format!("{label}: additional_to"), addr, errs);
    }

    for (i, hook) in wc.webhooks.iter().enumerate() {
        let hook_label = format!("{label}: webhooks[{i}]");
        check_headers(&hook_label, &hook.header, errs);
        check_useragent(&format!("{hook_label}: useragent"), hook.useragent.as_deref(), errs);
        check_http_url(&hook_label, "url", &hook.url, errs);
        if !WEBHOOK_METHODS.contains(&hook.method.as_str()) {
            errs.push(format!(
                "{hook_label}: method `{}` must be one of {}",
                hook.method,
                WEBHOOK_METHODS.join(", ")
            ));
        }
    }

    if errs.len() > before {
        return None;
    }

    Some(WatchDefinition {
        id: WatchId::new(wc.name.clone(), wc.url.clone()),
        description: wc.description.clone(),
        schedule: schedule?,
        request: RequestSpec {
            url: wc.url.clone(),
            method,
            headers: wc.header.clone(),
            body: wc.body.clone().filter(|b| !b.is_empty()),
            useragent: wc.useragent.clone().filter(|u| !u.is_empty()),
        },
        transform: transform?,
        soft_error_patterns,
        skip_soft_error_escalation: wc.skip_soft_error_patterns,
        exempt_statuses,
        additional_to: wc.additional_to.clone(),
        webhooks: wc.webhooks.clone(),
        disabled: wc.disabled,
    })
}

fn validate_mail(mail: &MailConfig, errs: &mut Vec<String>) {
    if mail.server.trim().is_empty() {
        errs.push("mail.server is required".to_string());
    }
    if mail.port == 0 {
        errs.push("mail.port must be greater than zero".to_string());
    }
    if mail.from.name.trim().is_empty() {
        errs.push("mail.from.name is required".to_string());
    }
    check_address("mail.from.mail", &mail.from.mail, errs);
    if mail.to.is_empty() {
        errs.push("mail.to needs at least one recipient".to_string());
    }
    for addr in &mail.to {
        check_address("mail.to", addr, errs);
    }
    if mail.retries == 0 {
        errs.push("mail.retries must be at least 1".to_string());
    }
}

fn validate_proxy(proxy: &ProxyConfig, errs: &mut Vec<String>) {
    check_http_url("proxy", "url", &proxy.url, errs);
    let has_user = proxy.username.as_deref().is_some_and(|u| !u.is_empty());
    let has_pass = proxy.password.as_deref().is_some_and(|p| !p.is_empty());
    if has_user != has_pass {
        errs.push("proxy: username and password must be set together".to_string());
    }
}

fn validate_statuses(label: &str, codes: &[u16], errs: &mut Vec<String>) {
    for code in codes {
        if !(100..=999).contains(code) {
            errs.push(format!("{label}: {code} is not a valid status code"));
        }
    }
}

fn compile_patterns(label: &str, raw: &[String], errs: &mut Vec<String>) -> Vec<Regex> {
    raw.iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                errs.push(format!("{label}: invalid pattern `{p}`: {e}"));
                None
            }
        })
        .collect()
}

fn check_http_url(label: &str, field: &str, raw: &str, errs: &mut Vec<String>) {
    match reqwest::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        Ok(u) => errs.push(format!(
            "{label}: {field} `{raw}` has unsupported scheme `{}`",
            u.scheme()
        )),
        Err(e) => errs.push(format!("{label}: {field} `{raw}` is not a valid URL: {e}")),
    }
}

/// Header names and values must be sendable as-is; otherwise every fetch
/// would fail the same way.
fn check_headers(label: &str, headers: &BTreeMap<String, String>, errs: &mut Vec<String>) {
    for (name, value) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errs.push(format!("{label}: invalid header name `{name}`"));
        }
        if HeaderValue::from_str(value).is_err() {
            errs.push(format!("{label}: invalid value for header `{name}`"));
        }
    }
}

fn check_useragent(label: &str, ua: Option<&str>, errs: &mut Vec<String>) {
    if let Some(ua) = ua {
        if HeaderValue::from_str(ua).is_err() {
            errs.push(format!("{label}: `{}` is not a valid header value", ua.escape_debug()));
        }
    }
}

fn check_address(label: &str, raw: &str, errs: &mut Vec<String>) {
    if raw.parse::<Address>().is_err() {
        errs.push(format!("{label}: `{raw}` is not a valid mail address"));
    }
}

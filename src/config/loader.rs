// src/config/loader.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::Configuration;
use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "WEB_WATCHER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const ENV_SMTP_PASSWORD: &str = "WEB_WATCHER_SMTP_PASSWORD";
pub const ENV_PROXY_PASSWORD: &str = "WEB_WATCHER_PROXY_PASSWORD";

/// Config path from `$WEB_WATCHER_CONFIG`, falling back to `config.json`.
pub fn config_path_from_env() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read a config file. `.toml` files are parsed as TOML, everything else as JSON.
pub fn load_from(path: &Path) -> Result<Configuration, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse(&content, &ext)?;
    resolve_env_secrets(&mut cfg)?;
    Ok(cfg)
}

pub fn parse(s: &str, hint_ext: &str) -> Result<Configuration, ConfigError> {
    if hint_ext == "toml" {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Replace `"ENV"` placeholders with secrets from the environment.
fn resolve_env_secrets(cfg: &mut Configuration) -> Result<(), ConfigError> {
    if let Some(mail) = cfg.mail.as_mut() {
        resolve_one(&mut mail.password, ENV_SMTP_PASSWORD)?;
    }
    if let Some(proxy) = cfg.proxy.as_mut() {
        resolve_one(&mut proxy.password, ENV_PROXY_PASSWORD)?;
    }
    Ok(())
}

fn resolve_one(slot: &mut Option<String>, var: &str) -> Result<(), ConfigError> {
    let wants_env = slot
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("env"));
    if wants_env {
        let value = std::env::var(var)
            .map_err(|_| ConfigError::Invalid(vec![format!("missing {var} env var")]))?;
        *slot = Some(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn json_defaults_are_applied() {
        let cfg = parse(
            r#"{"watches":[{"name":"a","url":"https://example.com"}]}"#,
            "json",
        )
        .unwrap();
        assert_eq!(cfg.retry.count, 3);
        assert_eq!(cfg.retry.delay, Duration::from_secs(3));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.graceful_timeout, Duration::from_secs(5));
        assert_eq!(cfg.useragent, crate::config::model::DEFAULT_USERAGENT);
        assert!(cfg.mail.is_none());
        assert_eq!(cfg.watches.len(), 1);
        assert!(cfg.watches[0].cron.is_none());
    }

    #[test]
    fn toml_with_humantime_durations() {
        let cfg = parse(
            r#"
timeout = "10s"
graceful_timeout = "1m"

[retry]
count = 1
delay = "250ms"

[[watches]]
name = "b"
url = "https://example.org"
cron = "*/5 * * * *"
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.graceful_timeout, Duration::from_secs(60));
        assert_eq!(cfg.retry.delay, Duration::from_millis(250));
        assert_eq!(cfg.watches[0].cron.as_deref(), Some("*/5 * * * *"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse(r#"{"watchez":[]}"#, "json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

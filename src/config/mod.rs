// src/config/mod.rs
pub mod loader;
pub mod model;
pub mod validate;

use std::path::Path;

pub use model::{Configuration, MailConfig, ProxyConfig, WatchConfig, WebhookConfig};
pub use validate::{validate, Settings};

use crate::error::ConfigError;

/// Read, parse and validate the config file at `path`.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    validate(loader::load_from(path)?)
}

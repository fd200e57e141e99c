//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::FunderConfig;
use crate::crypto::Envelope;
use crate::config::validation::{validate_config, ValidationError};

pub const FEED_API_KEY_ENV: &str = "XFUNDER_FEED_API_KEY";
pub const TELEGRAM_TOKEN_ENV: &str = "XFUNDER_TELEGRAM_BOT_TOKEN";
pub const RPC_URL_ENV: &str = "XFUNDER_RPC_URL";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    MissingSecret(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingSecret(e) => write!(f, "Missing secret: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<FunderConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: FunderConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config)
}

/// Load from `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<FunderConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(FunderConfig::default()),
    }
}

/// Build the envelope from the server secret in the environment.
pub fn load_envelope() -> Result<Envelope, ConfigError> {
    Envelope::from_env().map_err(|e| ConfigError::MissingSecret(e.to_string()))
}

fn finish(mut config: FunderConfig) -> Result<FunderConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets and deployment-specific endpoints come from the environment.
fn apply_env_overrides(config: &mut FunderConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(key) = lookup(FEED_API_KEY_ENV) {
        config.feed.api_key = key;
    }
    if let Some(token) = lookup(TELEGRAM_TOKEN_ENV) {
        config.notify.bot_token = token;
    }
    if let Some(url) = lookup(RPC_URL_ENV) {
        config.settlement.rpc_url = url;
    }
}

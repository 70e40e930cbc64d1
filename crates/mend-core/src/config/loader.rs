//! Layered configuration loading.
//!
//! Precedence, lowest to highest: built-in defaults, `MEND_*` environment
//! variables, a config file (`./mend.yaml`, else `~/.mend/config.yaml`),
//! programmatic overrides. Each layer is a `ConfigPatch` merged over the
//! previous one.

use super::schema::{ConfigPatch, MendConfig};
use mend_common::StrategyKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the effective configuration, merging all layers.
    pub async fn load(programmatic: Option<ConfigPatch>) -> Result<MendConfig, ConfigError> {
        let mut config = MendConfig::default();

        env_patch().apply(&mut config);

        if let Some(path) = Self::find_config_file() {
            let patch = Self::load_file(&path).await?;
            patch.apply(&mut config);
        }

        if let Some(patch) = programmatic {
            patch.apply(&mut config);
        }

        config.normalize();
        Ok(config)
    }

    /// `./mend.yaml` if present, else `~/.mend/config.yaml`.
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("./mend.yaml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".mend").join("config.yaml");
            if home_config.exists() {
                return Some(home_config);
            }
        }
        None
    }

    pub async fn load_file(path: &Path) -> Result<ConfigPatch, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let patch: ConfigPatch = serde_yaml::from_str(&content)?;
        Ok(patch)
    }
}

/// Build a patch from `MEND_*` environment variables. Unparseable values
/// are skipped with a warning.
pub fn env_patch() -> ConfigPatch {
    let mut patch = ConfigPatch::default();

    patch.enabled = env_bool("MEND_ENABLED");
    patch.strategies = env_strategies("MEND_STRATEGIES");
    patch.max_attempts = env_parse("MEND_MAX_ATTEMPTS");
    patch.cache_healing = env_bool("MEND_CACHE_HEALING");

    patch.ollama.url = std::env::var("MEND_OLLAMA_URL").ok();
    patch.ollama.model = std::env::var("MEND_OLLAMA_MODEL").ok();
    patch.ollama.timeout_ms = env_parse("MEND_OLLAMA_TIMEOUT_MS");

    patch.retry.on_timeout = env_bool("MEND_RETRY_ON_TIMEOUT");
    patch.retry.on_flakiness = env_bool("MEND_RETRY_ON_FLAKINESS");
    patch.retry.max_retries = env_parse("MEND_RETRY_MAX_RETRIES");
    patch.retry.initial_backoff_ms = env_parse("MEND_RETRY_INITIAL_BACKOFF_MS");

    patch.telemetry.enabled = env_bool("MEND_TELEMETRY_ENABLED");
    if let Ok(level) = std::env::var("MEND_LOG_LEVEL") {
        match serde_yaml::from_str(&level) {
            Ok(parsed) => patch.telemetry.log_level = Some(parsed),
            Err(_) => warn!("ignoring unparseable MEND_LOG_LEVEL: {}", level),
        }
    }

    patch
}

fn env_bool(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("ignoring unparseable {}: {}", name, value);
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring unparseable {}: {}", name, value);
            None
        }
    }
}

fn env_strategies(name: &str) -> Option<Vec<StrategyKind>> {
    let value = std::env::var(name).ok()?;
    let mut strategies = Vec::new();
    for tag in value.split(',').filter(|t| !t.trim().is_empty()) {
        match tag.trim().parse() {
            Ok(kind) => strategies.push(kind),
            Err(_) => {
                warn!("ignoring unknown strategy tag in {}: {}", name, tag);
            }
        }
    }
    if strategies.is_empty() {
        None
    } else {
        Some(strategies)
    }
}

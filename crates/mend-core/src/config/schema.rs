use mend_common::StrategyKind;
use serde::{Deserialize, Serialize};

/// Engine configuration, captured at `Healer` construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MendConfig {
    /// Master switch; disabled healing returns structured failures.
    pub enabled: bool,
    /// Strategy dispatch order. Duplicates are dropped at construction.
    pub strategies: Vec<StrategyKind>,
    /// Healing retry budget per `heal` call.
    pub max_attempts: usize,
    /// Per-process cache of healed selectors.
    pub cache_healing: bool,
    pub ollama: OllamaConfig,
    pub retry: RetryConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for MendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategies: StrategyKind::all(),
            max_attempts: 3,
            cache_healing: true,
            ollama: OllamaConfig::default(),
            retry: RetryConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl MendConfig {
    /// Clamp fields to their documented minimums.
    pub fn normalize(&mut self) {
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.retry.initial_backoff_ms < 100 {
            self.retry.initial_backoff_ms = 100;
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            self.retry.max_backoff_ms = self.retry.initial_backoff_ms;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            timeout_ms: default_ollama_timeout_ms(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_ollama_timeout_ms() -> u64 {
    30000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub on_timeout: bool,
    #[serde(default = "default_true")]
    pub on_flakiness: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            on_timeout: true,
            on_flakiness: true,
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    10000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: LogLevel::default(),
        }
    }
}

/// Emission floor for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Partial configuration: every field optional, merged over a base config.
///
/// Used for all three overlay layers (environment, file, programmatic) and
/// as the payload of `Healer::update_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub strategies: Option<Vec<StrategyKind>>,
    pub max_attempts: Option<usize>,
    pub cache_healing: Option<bool>,
    pub ollama: OllamaPatch,
    pub retry: RetryPatch,
    pub telemetry: TelemetryPatch,
}

impl ConfigPatch {
    pub fn apply(&self, config: &mut MendConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(ref strategies) = self.strategies {
            config.strategies = strategies.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(cache_healing) = self.cache_healing {
            config.cache_healing = cache_healing;
        }
        self.ollama.apply(&mut config.ollama);
        self.retry.apply(&mut config.retry);
        self.telemetry.apply(&mut config.telemetry);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaPatch {
    pub url: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl OllamaPatch {
    fn apply(&self, config: &mut OllamaConfig) {
        if let Some(ref url) = self.url {
            config.url = url.clone();
        }
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPatch {
    pub on_timeout: Option<bool>,
    pub on_flakiness: Option<bool>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl RetryPatch {
    fn apply(&self, config: &mut RetryConfig) {
        if let Some(on_timeout) = self.on_timeout {
            config.on_timeout = on_timeout;
        }
        if let Some(on_flakiness) = self.on_flakiness {
            config.on_flakiness = on_flakiness;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(initial_backoff_ms) = self.initial_backoff_ms {
            config.initial_backoff_ms = initial_backoff_ms;
        }
        if let Some(max_backoff_ms) = self.max_backoff_ms {
            config.max_backoff_ms = max_backoff_ms;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryPatch {
    pub enabled: Option<bool>,
    pub log_level: Option<LogLevel>,
}

impl TelemetryPatch {
    fn apply(&self, config: &mut TelemetryConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MendConfig::default();
        assert!(config.enabled);
        assert_eq!(config.strategies.len(), 4);
        assert_eq!(config.max_attempts, 3);
        assert!(config.cache_healing);
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert_eq!(config.ollama.timeout_ms, 30000);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.retry.max_backoff_ms, 10000);
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.log_level, LogLevel::Info);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut config = MendConfig::default();
        let patch = ConfigPatch {
            max_attempts: Some(1),
            ollama: OllamaPatch {
                model: Some("qwen2.5-coder".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        patch.apply(&mut config);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.ollama.model, "qwen2.5-coder");
        // Untouched fields keep their defaults.
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert!(config.enabled);
    }

    #[test]
    fn normalize_enforces_minimums() {
        let mut config = MendConfig {
            max_attempts: 0,
            ..Default::default()
        };
        config.retry.initial_backoff_ms = 10;
        config.retry.max_backoff_ms = 5;
        config.normalize();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.retry.initial_backoff_ms, 100);
        assert_eq!(config.retry.max_backoff_ms, 100);
    }

    #[test]
    fn partial_yaml_deserializes_as_patch() {
        let yaml = "max_attempts: 5\nollama:\n  url: http://127.0.0.1:8080\n";
        let patch: ConfigPatch = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(patch.max_attempts, Some(5));
        assert_eq!(patch.ollama.url.as_deref(), Some("http://127.0.0.1:8080"));
        assert!(patch.enabled.is_none());
    }

    #[test]
    fn strategy_list_deserializes_from_tags() {
        let yaml = "strategies:\n  - css-hierarchy\n  - data-testid-recovery\n";
        let patch: ConfigPatch = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            patch.strategies,
            Some(vec![
                StrategyKind::CssHierarchy,
                StrategyKind::TestIdRecovery
            ])
        );
    }
}

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, env_patch};
pub use schema::{
    ConfigPatch, LogLevel, MendConfig, OllamaConfig, OllamaPatch, RetryConfig, RetryPatch,
    TelemetryConfig, TelemetryPatch,
};

use mend_core::config::{ConfigError, ConfigLoader, ConfigPatch, MendConfig};
use mend_core::StrategyKind;
use std::io::Write;

#[tokio::test]
async fn file_patch_overrides_only_named_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "max_attempts: 5\nstrategies:\n  - css-hierarchy\nollama:\n  timeout_ms: 1500\nretry:\n  max_retries: 4"
    )
    .unwrap();

    let patch = ConfigLoader::load_file(file.path()).await.unwrap();
    let mut config = MendConfig::default();
    patch.apply(&mut config);

    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.strategies, vec![StrategyKind::CssHierarchy]);
    assert_eq!(config.ollama.timeout_ms, 1500);
    assert_eq!(config.retry.max_retries, 4);
    // Untouched sections keep their defaults.
    assert!(config.enabled);
    assert_eq!(config.ollama.url, "http://localhost:11434");
    assert_eq!(config.retry.initial_backoff_ms, 1000);
}

#[tokio::test]
async fn malformed_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_attempts: [not a number").unwrap();

    let err = ConfigLoader::load_file(file.path()).await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let err = ConfigLoader::load_file(std::path::Path::new("/nonexistent/mend.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[tokio::test]
async fn programmatic_patch_wins_over_environment() {
    // The only test in this binary that touches the process environment.
    unsafe {
        std::env::set_var("MEND_MAX_ATTEMPTS", "7");
        std::env::set_var("MEND_OLLAMA_MODEL", "from-env");
    }

    let programmatic = ConfigPatch {
        max_attempts: Some(2),
        ..Default::default()
    };
    let config = ConfigLoader::load(Some(programmatic)).await.unwrap();

    unsafe {
        std::env::remove_var("MEND_MAX_ATTEMPTS");
        std::env::remove_var("MEND_OLLAMA_MODEL");
    }

    // Programmatic beats environment; untouched env values still apply.
    assert_eq!(config.max_attempts, 2);
    assert_eq!(config.ollama.model, "from-env");
}

#[tokio::test]
async fn loaded_config_is_normalized() {
    let programmatic = ConfigPatch {
        max_attempts: Some(0),
        ..Default::default()
    };
    let config = ConfigLoader::load(Some(programmatic)).await.unwrap();
    assert_eq!(config.max_attempts, 1);
}

use async_trait::async_trait;
use mend_common::{Driver, DriverError, Interaction, InteractionOutcome, WaitState};
use mend_core::config::{MendConfig, RetryConfig};
use mend_core::healer::Healer;
use mend_core::retry::RetryHandler;
use mend_core::strategy::HealOptions;
use mend_core::StrategyKind;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Driver whose interactions succeed only for allow-listed selectors, with
/// an optional queue of scripted failures consumed first.
#[derive(Debug, Default)]
struct MockDriver {
    counts: HashMap<String, usize>,
    test_id_elements: Value,
    working_selectors: Vec<String>,
    scripted_failures: VecDeque<DriverError>,
    interactions: Vec<String>,
}

impl MockDriver {
    fn new() -> Self {
        Self {
            test_id_elements: json!([]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn probe(&mut self, selector: &str) -> Result<usize, DriverError> {
        Ok(*self.counts.get(selector).unwrap_or(&0))
    }

    async fn wait(
        &mut self,
        selector: &str,
        _state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if *self.counts.get(selector).unwrap_or(&0) >= 1 {
            Ok(())
        } else {
            Err(DriverError::WaitTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn introspect(&mut self, code: &str, _args: Value) -> Result<Value, DriverError> {
        if code.contains("skipTags") {
            Ok(json!([]))
        } else {
            Ok(self.test_id_elements.clone())
        }
    }

    async fn interact(
        &mut self,
        selector: &str,
        _action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError> {
        self.interactions.push(selector.to_string());
        if let Some(failure) = self.scripted_failures.pop_front() {
            return Err(failure);
        }
        if self.working_selectors.iter().any(|s| s == selector) {
            Ok(InteractionOutcome::ok())
        } else {
            Err(DriverError::NotFound(selector.to_string()))
        }
    }

    async fn url(&mut self) -> Result<String, DriverError> {
        Ok("https://app.test".to_string())
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok("App".to_string())
    }
}

fn handler() -> RetryHandler {
    RetryHandler::new(RetryConfig::default())
}

fn test_id_healer() -> Healer {
    Healer::new(MendConfig {
        strategies: vec![StrategyKind::TestIdRecovery],
        max_attempts: 1,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn locator_failure_heals_and_replays_without_visible_retry() {
    let mut driver = MockDriver::new();
    driver.counts.insert("[data-cy=\"pay\"]".to_string(), 1);
    driver.test_id_elements = json!([{
        "tag": "button",
        "classes": [],
        "test_id": "pay",
        "test_id_attr": "data-cy",
        "visible": true
    }]);
    driver.working_selectors = vec!["[data-cy=\"pay\"]".to_string()];

    let mut healer = test_id_healer();
    let outcome = handler()
        .execute_with_healing(
            &mut driver,
            &mut healer,
            "[data-testid=\"pay\"]",
            &Interaction::Click,
            &HealOptions::default(),
        )
        .await
        .unwrap();

    assert!(outcome.success);
    // One failed attempt on the broken selector, one replay on the healed
    // one; the retry budget was never consumed.
    assert_eq!(
        driver.interactions,
        vec![
            "[data-testid=\"pay\"]".to_string(),
            "[data-cy=\"pay\"]".to_string()
        ]
    );
}

#[tokio::test]
async fn unhealed_locator_failure_surfaces_the_native_error() {
    let mut driver = MockDriver::new();
    let mut healer = test_id_healer();

    let err = handler()
        .execute_with_healing(
            &mut driver,
            &mut healer,
            "[data-testid=\"gone\"]",
            &Interaction::Click,
            &HealOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::NotFound(_)));
    assert!(err.to_string().contains("[data-testid=\"gone\"]"));
    // Locator errors are not retried on their own.
    assert_eq!(driver.interactions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn flaky_interaction_is_retried_with_backoff() {
    let mut driver = MockDriver::new();
    driver.working_selectors = vec!["#save".to_string()];
    driver.scripted_failures = VecDeque::from([
        DriverError::NotActionable {
            selector: "#save".into(),
            state: "not visible".into(),
        },
        DriverError::NotActionable {
            selector: "#save".into(),
            state: "not stable".into(),
        },
    ]);

    let mut healer = test_id_healer();
    let started = tokio::time::Instant::now();
    let outcome = handler()
        .execute_with_healing(
            &mut driver,
            &mut healer,
            "#save",
            &Interaction::Click,
            &HealOptions::default(),
        )
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(driver.interactions.len(), 3);
    // Exponential backoff: 1000 ms then 2000 ms.
    assert!(started.elapsed() >= Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_raises_last_error() {
    let handler = RetryHandler::new(RetryConfig {
        max_retries: 2,
        ..Default::default()
    });
    let attempts = AtomicU32::new(0);
    let err = handler
        .with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<(), _>(DriverError::Other(format!(
                    "timeout waiting for element, attempt {}",
                    n
                )))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(err.to_string().contains("attempt 2"));
}

#[tokio::test(start_paused = true)]
async fn with_retry_recovers_transient_failures() {
    let attempts = AtomicU32::new(0);
    let value = handler()
        .with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DriverError::Other("socket hang up".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_retryable_errors_fail_fast() {
    let attempts = AtomicU32::new(0);
    let err = handler()
        .with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(DriverError::Other("assertion blew up".into())) }
        })
        .await
        .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(err.to_string().contains("assertion blew up"));
}

#[tokio::test]
async fn timeout_retry_can_be_disabled() {
    let handler = RetryHandler::new(RetryConfig {
        on_timeout: false,
        ..Default::default()
    });
    let attempts = AtomicU32::new(0);
    let result: Result<(), _> = handler
        .with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(DriverError::WaitTimeout {
                    selector: "#slow".into(),
                    timeout_ms: 5000,
                })
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn goto_retries_network_errors() {
    let mut driver = MockDriver::new();
    driver.working_selectors = vec!["".to_string()];
    driver.scripted_failures = VecDeque::from([DriverError::Navigation(
        "net::ERR_CONNECTION_REFUSED".into(),
    )]);

    let outcome = handler()
        .interact_with_retry(&mut driver, "", &Interaction::Goto("https://app.test".into()))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(driver.interactions.len(), 2);
}

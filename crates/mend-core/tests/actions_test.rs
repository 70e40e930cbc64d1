use async_trait::async_trait;
use mend_common::{Driver, DriverError, Interaction, InteractionOutcome, WaitState};
use mend_core::actions::Actions;
use mend_core::config::MendConfig;
use mend_core::StrategyKind;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockDriver {
    counts: HashMap<String, usize>,
    test_id_elements: Value,
    interactions: Vec<(String, String)>,
    navigations: Vec<String>,
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
        action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError> {
        if let Interaction::Goto(url) = action {
            self.navigations.push(url.clone());
            return Ok(InteractionOutcome::ok());
        }
        self.interactions
            .push((selector.to_string(), action.verb().to_string()));
        if *self.counts.get(selector).unwrap_or(&0) >= 1 {
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

fn config() -> MendConfig {
    MendConfig {
        strategies: vec![StrategyKind::TestIdRecovery],
        max_attempts: 1,
        ..Default::default()
    }
}

fn page_with_test_id(attr: &str, value: &str) -> MockDriver {
    let mut driver = MockDriver::default();
    driver.counts.insert(format!("[{attr}=\"{value}\"]"), 1);
    driver.test_id_elements = json!([{
        "tag": "button",
        "classes": [],
        "test_id": value,
        "test_id_attr": attr,
        "visible": true
    }]);
    driver
}

#[tokio::test]
async fn click_heals_broken_selector_transparently() {
    let driver = page_with_test_id("data-cy", "checkout");
    let mut actions = Actions::new(driver, config()).unwrap();

    let outcome = actions.click("[data-testid=\"checkout\"]").await.unwrap();
    assert!(outcome.success);

    let driver = actions.into_driver();
    assert_eq!(
        driver.interactions,
        vec![
            ("[data-testid=\"checkout\"]".to_string(), "click".to_string()),
            ("[data-cy=\"checkout\"]".to_string(), "click".to_string()),
        ]
    );
}

#[tokio::test]
async fn fill_passes_value_through() {
    let mut driver = page_with_test_id("data-testid", "email");
    driver.counts.insert("#email".to_string(), 0);
    let mut actions = Actions::new(driver, config()).unwrap();

    // The selector resolves directly; no healing involved.
    let outcome = actions
        .fill("[data-testid=\"email\"]", "user@test.dev")
        .await
        .unwrap();
    assert!(outcome.success);
    let driver = actions.into_driver();
    assert_eq!(driver.interactions.len(), 1);
    assert_eq!(driver.interactions[0].1, "fill");
}

#[tokio::test]
async fn goto_does_not_consult_the_healer() {
    let driver = MockDriver::default();
    let mut actions = Actions::new(driver, config()).unwrap();

    let outcome = actions.goto("https://app.test/cart").await.unwrap();
    assert!(outcome.success);
    let driver = actions.into_driver();
    assert_eq!(driver.navigations, vec!["https://app.test/cart".to_string()]);
    assert!(driver.interactions.is_empty());
}

#[tokio::test]
async fn wait_for_heals_vanished_selector() {
    let driver = page_with_test_id("data-test", "spinner-done");
    let mut actions = Actions::new(driver, config()).unwrap();

    actions
        .wait_for(
            "[data-testid=\"spinner-done\"]",
            WaitState::Attached,
            Duration::from_millis(500),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn wait_for_surfaces_timeout_when_healing_fails() {
    let driver = MockDriver::default();
    let mut actions = Actions::new(driver, config()).unwrap();

    let err = actions
        .wait_for(
            "[data-testid=\"never\"]",
            WaitState::Attached,
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::WaitTimeout { .. }));
}

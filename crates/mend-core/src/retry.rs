//! Retry handling for transient interaction failures.
//!
//! Driver errors are classified by substring on their rendered message.
//! Retryable classes back off exponentially; locator-class failures
//! escalate to healing in `execute_with_healing`. The per-call state
//! machine is `trying -> (success) | (retryable + budget: waiting ->
//! trying) | (fatal or exhausted: failed)`.

use crate::config::RetryConfig;
use crate::healer::Healer;
use crate::strategy::HealOptions;
use mend_common::{Driver, DriverError, Interaction, InteractionOutcome};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Failure class assigned by substring matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Network,
    Flakiness,
    Locator,
    Other,
}

const TIMEOUT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "waiting for selector",
    "waiting for element",
    "exceeded timeout",
];

const NETWORK_MARKERS: &[&str] = &[
    "net::err",
    "network error",
    "connection refused",
    "econnrefused",
    "socket hang up",
];

const FLAKINESS_MARKERS: &[&str] = &[
    "not visible",
    "not attached",
    "not stable",
    "intercepts pointer events",
    "not actionable",
];

const LOCATOR_MARKERS: &[&str] = &[
    "locator",
    "selector",
    "element not found",
    "no element matches",
    "could not find",
];

/// Classify an error message. Classes are checked in fixed order; a message
/// matching several (e.g. "timeout waiting for selector") takes the first.
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    let matches = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if matches(TIMEOUT_MARKERS) {
        ErrorClass::Timeout
    } else if matches(NETWORK_MARKERS) {
        ErrorClass::Network
    } else if matches(FLAKINESS_MARKERS) {
        ErrorClass::Flakiness
    } else if matches(LOCATOR_MARKERS) {
        ErrorClass::Locator
    } else {
        ErrorClass::Other
    }
}

pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn is_retryable(&self, class: ErrorClass) -> bool {
        match class {
            ErrorClass::Timeout => self.config.on_timeout,
            ErrorClass::Network => true,
            ErrorClass::Flakiness => self.config.on_flakiness,
            ErrorClass::Locator | ErrorClass::Other => false,
        }
    }

    /// Delay before retry number `retry` (zero-based): doubling from the
    /// initial backoff, capped.
    fn backoff(&self, retry: u32) -> Duration {
        let ms = self
            .config
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(retry));
        Duration::from_millis(ms.min(self.config.max_backoff_ms))
    }

    /// Run `op`, retrying retryable failures while budget remains. The last
    /// error is returned verbatim on exhaustion.
    pub async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let mut retries = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let class = classify(&e.to_string());
                    if !self.is_retryable(class) || retries >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = self.backoff(retries);
                    warn!(?class, ?delay, retry = retries + 1, "retrying after error: {}", e);
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }

    /// Run a driver interaction under the retry policy, without healing.
    /// Used for interactions that do not target an element (goto,
    /// screenshot).
    pub async fn interact_with_retry(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError> {
        let mut retries = 0u32;
        loop {
            match driver.interact(selector, action).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    let class = classify(&e.to_string());
                    if !self.is_retryable(class) || retries >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = self.backoff(retries);
                    warn!(?class, ?delay, retry = retries + 1, "retrying interaction: {}", e);
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }

    /// Like `with_retry` for a driver interaction, but a locator-class
    /// failure first invokes the healer; a successful healing replays the
    /// action with the healed selector without consuming the retry budget.
    pub async fn execute_with_healing(
        &self,
        driver: &mut dyn Driver,
        healer: &mut Healer,
        selector: &str,
        action: &Interaction,
        options: &HealOptions,
    ) -> Result<InteractionOutcome, DriverError> {
        let mut current = selector.to_string();
        let mut retries = 0u32;
        let mut healed = false;
        loop {
            match driver.interact(&current, action).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    let class = classify(&e.to_string());
                    debug!(?class, selector = %current, "interaction failed: {}", e);

                    if class == ErrorClass::Locator && !healed {
                        healed = true;
                        let result = healer.heal(driver, &current, options).await;
                        if result.success {
                            info!(
                                broken = %current,
                                replacement = %result.selector,
                                "replaying action with healed selector"
                            );
                            current = result.selector;
                            continue;
                        }
                        // Unhealed locator failures surface the driver's
                        // native error so test failures stay diagnosable.
                        return Err(e);
                    }

                    if !self.is_retryable(class) || retries >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = self.backoff(retries);
                    warn!(?class, ?delay, retry = retries + 1, "retrying interaction: {}", e);
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(classify("Timeout 30000ms exceeded"), ErrorClass::Timeout);
        assert_eq!(
            classify("timeout waiting for selector '#x'"),
            ErrorClass::Timeout
        );
        assert_eq!(classify("page crashed: net::ERR_CONNECTION_RESET"), ErrorClass::Network);
        assert_eq!(classify("ECONNREFUSED 127.0.0.1:9222"), ErrorClass::Network);
        assert_eq!(classify("socket hang up"), ErrorClass::Network);
        assert_eq!(classify("element is not visible"), ErrorClass::Flakiness);
        assert_eq!(
            classify("<div> intercepts pointer events"),
            ErrorClass::Flakiness
        );
        assert_eq!(classify("element not found for '#x'"), ErrorClass::Locator);
        assert_eq!(
            classify("no element matches selector '#gone'"),
            ErrorClass::Locator
        );
        assert_eq!(classify("locator resolved to nothing"), ErrorClass::Locator);
        assert_eq!(classify("something exploded"), ErrorClass::Other);
    }

    #[test]
    fn timeout_markers_win_over_locator_markers() {
        // Contains both "waiting for selector" and "selector".
        assert_eq!(
            classify("waiting for selector '.spinner' to detach"),
            ErrorClass::Timeout
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let handler = RetryHandler::new(RetryConfig::default());
        assert_eq!(handler.backoff(0), Duration::from_millis(1000));
        assert_eq!(handler.backoff(1), Duration::from_millis(2000));
        assert_eq!(handler.backoff(2), Duration::from_millis(4000));
        assert_eq!(handler.backoff(3), Duration::from_millis(8000));
        assert_eq!(handler.backoff(4), Duration::from_millis(10000));
        assert_eq!(handler.backoff(10), Duration::from_millis(10000));
    }

    #[test]
    fn retryability_honors_policy() {
        let handler = RetryHandler::new(RetryConfig {
            on_timeout: false,
            on_flakiness: true,
            ..Default::default()
        });
        assert!(!handler.is_retryable(ErrorClass::Timeout));
        assert!(handler.is_retryable(ErrorClass::Flakiness));
        assert!(handler.is_retryable(ErrorClass::Network));
        assert!(!handler.is_retryable(ErrorClass::Locator));
        assert!(!handler.is_retryable(ErrorClass::Other));
    }
}

//! Action wrapper.
//!
//! Routes interactions through the healer and the retry handler with one
//! uniform contract: element-targeting actions escalate locator failures to
//! healing, non-element actions (goto, screenshot) run under the plain
//! retry policy. Unhealed failures surface the driver's native error.

use crate::config::MendConfig;
use crate::healer::Healer;
use crate::llm::client::LlmError;
use crate::retry::RetryHandler;
use crate::strategy::HealOptions;
use mend_common::{Driver, DriverError, Interaction, InteractionOutcome, WaitState};
use std::path::PathBuf;
use std::time::Duration;

pub struct Actions<D: Driver> {
    driver: D,
    healer: Healer,
    retry: RetryHandler,
}

impl<D: Driver> Actions<D> {
    /// Build the wrapper from one configuration; healer and retry handler
    /// share it.
    pub fn new(driver: D, config: MendConfig) -> Result<Self, LlmError> {
        let retry = RetryHandler::new(config.retry.clone());
        let healer = Healer::new(config)?;
        Ok(Self {
            driver,
            healer,
            retry,
        })
    }

    pub fn from_parts(driver: D, healer: Healer, retry: RetryHandler) -> Self {
        Self {
            driver,
            healer,
            retry,
        }
    }

    pub async fn click(&mut self, selector: &str) -> Result<InteractionOutcome, DriverError> {
        self.perform(selector, Interaction::Click, &HealOptions::default())
            .await
    }

    pub async fn fill(
        &mut self,
        selector: &str,
        value: &str,
    ) -> Result<InteractionOutcome, DriverError> {
        self.perform(
            selector,
            Interaction::Fill(value.to_string()),
            &HealOptions::default(),
        )
        .await
    }

    pub async fn type_text(
        &mut self,
        selector: &str,
        text: &str,
    ) -> Result<InteractionOutcome, DriverError> {
        self.perform(
            selector,
            Interaction::Type(text.to_string()),
            &HealOptions::default(),
        )
        .await
    }

    pub async fn select(
        &mut self,
        selector: &str,
        value: &str,
    ) -> Result<InteractionOutcome, DriverError> {
        self.perform(
            selector,
            Interaction::Select(value.to_string()),
            &HealOptions::default(),
        )
        .await
    }

    pub async fn check(&mut self, selector: &str) -> Result<InteractionOutcome, DriverError> {
        self.perform(selector, Interaction::Check, &HealOptions::default())
            .await
    }

    pub async fn uncheck(&mut self, selector: &str) -> Result<InteractionOutcome, DriverError> {
        self.perform(selector, Interaction::Uncheck, &HealOptions::default())
            .await
    }

    pub async fn goto(&mut self, url: &str) -> Result<InteractionOutcome, DriverError> {
        self.retry
            .interact_with_retry(&mut self.driver, "", &Interaction::Goto(url.to_string()))
            .await
    }

    pub async fn screenshot(
        &mut self,
        path: Option<PathBuf>,
    ) -> Result<InteractionOutcome, DriverError> {
        self.retry
            .interact_with_retry(&mut self.driver, "", &Interaction::Screenshot(path))
            .await
    }

    /// Wait for a selector to reach a state, healing it first if it no
    /// longer resolves at all.
    pub async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        match self.driver.wait(selector, state, timeout).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let result = self
                    .healer
                    .heal(&mut self.driver, selector, &HealOptions::default())
                    .await;
                if result.success && result.selector != selector {
                    self.driver.wait(&result.selector, state, timeout).await
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Run one interaction with explicit healing options.
    pub async fn perform(
        &mut self,
        selector: &str,
        action: Interaction,
        options: &HealOptions,
    ) -> Result<InteractionOutcome, DriverError> {
        if action.targets_element() {
            self.retry
                .execute_with_healing(&mut self.driver, &mut self.healer, selector, &action, options)
                .await
        } else {
            self.retry
                .interact_with_retry(&mut self.driver, selector, &action)
                .await
        }
    }

    pub fn healer(&mut self) -> &mut Healer {
        &mut self.healer
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

//! The browser-facing seam.
//!
//! Every component that needs the live page goes through the `Driver` trait:
//! strategies validate candidates with `probe`, the introspector reads the
//! DOM through `introspect`, and the action wrapper performs interactions
//! with `interact`. Selector format is owned by the driver; the engine
//! treats selectors as opaque strings.

use crate::protocol::{Interaction, InteractionOutcome};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a driver.
///
/// Display strings matter: the retry handler classifies errors by
/// case-insensitive substring match on the rendered message.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("no element matches selector '{0}'")]
    NotFound(String),

    #[error("timeout waiting for selector '{selector}' after {timeout_ms} ms")]
    WaitTimeout { selector: String, timeout_ms: u64 },

    #[error("element '{selector}' is {state}")]
    NotActionable { selector: String, state: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{0}")]
    Other(String),
}

/// Element state to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Visible,
}

/// Browser automation driver consumed by the healing engine.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Count the elements the selector currently resolves to.
    /// A count of zero is not an error; `Err` means the probe itself failed.
    async fn probe(&mut self, selector: &str) -> Result<usize, DriverError>;

    /// Wait until the selector reaches `state` or the timeout elapses.
    async fn wait(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Execute `code` as the body of `(function (args) { ... })` in the page
    /// and return the JSON value it produces. This is the engine's only DOM
    /// read channel.
    async fn introspect(
        &mut self,
        code: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DriverError>;

    /// Perform an interaction against the element the selector resolves to.
    async fn interact(
        &mut self,
        selector: &str,
        action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError>;

    async fn url(&mut self) -> Result<String, DriverError>;

    async fn title(&mut self) -> Result<String, DriverError>;
}

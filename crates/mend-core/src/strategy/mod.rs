//! Healing strategies.
//!
//! Each strategy proposes replacement selectors from a different signal and
//! validates them against the live page. A strategy only claims selectors
//! whose shape it recognizes (`can_handle`); anything else is skipped by the
//! dispatcher. Strategies never trust their own candidates: the driver's
//! probe is the sole authority for "this selector works".

pub mod css_hierarchy;
pub mod llm_analysis;
pub mod test_id;
pub mod text_match;

pub use css_hierarchy::CssHierarchyStrategy;
pub use llm_analysis::LlmAnalysisStrategy;
pub use test_id::TestIdStrategy;
pub use text_match::TextMatchStrategy;

use crate::llm::client::LlmError;
use async_trait::async_trait;
use mend_common::{Candidate, Driver, DriverError, HealingResult, StrategyKind};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Per-call healing options.
#[derive(Debug, Clone, Default)]
pub struct HealOptions {
    /// Expected tag of the target element (e.g. `button`); used as a
    /// confidence bonus by the scoring strategies and as a hint in the LLM
    /// prompt.
    pub expected_type: Option<String>,
}

/// A strategy failure that is not a well-formed healing result.
///
/// The dispatcher logs these and continues with the next strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("introspection failed: {0}")]
    Introspection(#[from] DriverError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// A candidate-generation procedure.
#[async_trait]
pub trait HealingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy recognizes the broken selector's shape.
    fn can_handle(&self, selector: &str) -> bool;

    /// Propose and validate candidates. Returns a failure result (never an
    /// `Err`) when the selector yields no signal or no candidate validates.
    async fn heal(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, StrategyError>;

    /// Whether the strategy's backing service is reachable. Only the LLM
    /// strategy has one; everything else is always available.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Probe candidates in order and commit the first that resolves.
///
/// Driver errors during a probe count as "absent" for that candidate. The
/// remaining (untested or failed) candidates are attached as alternatives.
pub(crate) async fn validate_candidates(
    driver: &mut dyn Driver,
    candidates: Vec<Candidate>,
) -> Option<HealingResult> {
    for (index, candidate) in candidates.iter().enumerate() {
        let count = match driver.probe(&candidate.selector).await {
            Ok(count) => count,
            Err(e) => {
                debug!(
                    selector = %candidate.selector,
                    "probe failed during validation, treating as absent: {}", e
                );
                0
            }
        };
        if count >= 1 {
            let mut alternatives = candidates.clone();
            alternatives.remove(index);

            let mut result = HealingResult::healed(
                candidate.selector.clone(),
                candidate.confidence,
                candidate.strategy,
            )
            .with_alternatives(alternatives)
            .with_metadata("rationale", Value::String(candidate.rationale.clone()));
            for (key, value) in &candidate.metadata {
                result.metadata.insert(key.clone(), value.clone());
            }
            return Some(result);
        }
    }
    None
}

/// Escape a text literal for embedding in a quoted selector: backslash and
/// double-quote are escaped, line breaks and tabs collapse to single spaces.
pub(crate) fn escape_selector_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' | '\t' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

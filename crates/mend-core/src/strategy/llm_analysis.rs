//! LLM-backed analysis.
//!
//! Assembles a bounded snapshot of the page, asks the text-generation
//! backend for replacement selectors, and validates whatever comes back.
//! The model is never trusted: parsing degrades through three layers and
//! only a successful driver probe can commit a suggestion.

use super::{HealOptions, HealingStrategy, StrategyError};
use crate::config::OllamaConfig;
use crate::introspect;
use crate::llm::client::{LlmError, OllamaClient};
use crate::llm::parse::parse_suggestions;
use async_trait::async_trait;
use mend_common::{Candidate, Driver, ElementDescriptor, HealingResult, StrategyKind};
use tracing::debug;

/// Elements extracted for LLM context.
const MAX_CONTEXT_ELEMENTS: usize = 50;

/// Text cap for LLM extraction.
const MAX_CONTEXT_TEXT_LEN: usize = 100;

/// Elements embedded in the prompt.
const MAX_PROMPT_ELEMENTS: usize = 30;

/// Suggestions kept after parsing.
const MAX_SUGGESTIONS: usize = 5;

const INTERACTIVE_TAGS: &[&str] = &["button", "a", "input", "select", "textarea"];

pub struct LlmAnalysisStrategy {
    client: OllamaClient,
}

impl LlmAnalysisStrategy {
    /// Fails when the configured endpoint does not pass allow-listing.
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: OllamaClient::new(config)?,
        })
    }

    fn build_prompt(
        selector: &str,
        expected_type: Option<&str>,
        url: &str,
        title: &str,
        elements: &[ElementDescriptor],
    ) -> String {
        let slice = &elements[..elements.len().min(MAX_PROMPT_ELEMENTS)];
        let elements_json =
            serde_json::to_string(slice).unwrap_or_else(|_| "[]".to_string());
        format!(
            "You are repairing a broken element selector in a browser end-to-end test.\n\
             \n\
             Broken selector: {selector}\n\
             Expected element type: {expected}\n\
             Page URL: {url}\n\
             Page title: {title}\n\
             \n\
             Visible page elements (JSON):\n\
             {elements_json}\n\
             \n\
             Propose up to {max} replacement selectors for the element the broken \
             selector most likely targeted. Prefer, in this order: stable test \
             attributes (data-testid, data-test-id, data-cy, data-test), roles, \
             visible text, semantic CSS classes, stable ids.\n\
             Respond with ONLY a JSON object of the form:\n\
             {{\"suggestions\":[{{\"selector\":\"...\",\"confidence\":0.0,\"reasoning\":\"...\"}}]}}",
            selector = selector,
            expected = expected_type.unwrap_or("unknown"),
            url = url,
            title = title,
            elements_json = elements_json,
            max = MAX_SUGGESTIONS,
        )
    }
}

/// Order elements for the prompt: interactive tags first, then anything
/// visible with text, then the rest. Stable within each band.
fn prioritize(elements: &mut [ElementDescriptor]) {
    elements.sort_by_key(|e| {
        if INTERACTIVE_TAGS.contains(&e.tag.as_str()) {
            0
        } else if e.visible && e.text.as_deref().is_some_and(|t| !t.is_empty()) {
            1
        } else {
            2
        }
    });
}

#[async_trait]
impl HealingStrategy for LlmAnalysisStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LlmAnalysis
    }

    fn can_handle(&self, selector: &str) -> bool {
        !selector.trim().is_empty()
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    async fn heal(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, StrategyError> {
        if !self.client.is_available().await {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                format!("LLM backend unavailable at {}", self.client.base_url()),
            ));
        }

        let url = driver.url().await.map_err(StrategyError::Introspection)?;
        let title = driver.title().await.map_err(StrategyError::Introspection)?;
        let mut elements =
            introspect::extract_elements(driver, MAX_CONTEXT_ELEMENTS, MAX_CONTEXT_TEXT_LEN)
                .await?;
        prioritize(&mut elements);

        let prompt = Self::build_prompt(
            selector,
            options.expected_type.as_deref(),
            &url,
            &title,
            &elements,
        );
        debug!(prompt_len = prompt.len(), "querying LLM backend");

        let raw = self.client.generate(&prompt).await?;
        let suggestions = parse_suggestions(&raw, MAX_SUGGESTIONS);
        if suggestions.is_empty() {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no usable suggestions in LLM response",
            ));
        }

        let candidates: Vec<Candidate> = suggestions
            .into_iter()
            .map(|s| {
                Candidate::new(
                    s.selector,
                    s.confidence,
                    self.kind(),
                    if s.reasoning.is_empty() {
                        "suggested by LLM".to_string()
                    } else {
                        s.reasoning
                    },
                )
            })
            .collect();

        match super::validate_candidates(driver, candidates).await {
            Some(result) => Ok(result),
            None => Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no suggested selector resolved",
            )),
        }
    }
}

//! Test-ID recovery.
//!
//! Handles selectors that reference a stable automation attribute
//! (`data-testid` and friends). The literal is pulled out of the broken
//! selector, scored against every test ID present on the page, and the
//! survivors are re-emitted under each recognized attribute so that renames
//! across attribute conventions (`data-testid` -> `data-cy`) still heal.

use super::{HealOptions, HealingStrategy, StrategyError, escape_selector_text};
use crate::introspect;
use crate::similarity::{levenshtein_similarity, normalize_identifier};
use async_trait::async_trait;
use mend_common::{Candidate, Driver, HealingResult, StrategyKind, sort_candidates};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// Attributes conventionally used to mark elements for automation.
pub const RECOGNIZED_ATTRS: &[&str] =
    &["data-testid", "data-test-id", "data-cy", "data-test", "testid"];

static TEST_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[\s*(data-test-id|data-testid|data-cy|data-test|testid)\s*=\s*["']([^"']+)["']\s*\]"#,
    )
    .expect("test-id extraction pattern")
});

/// Fuzzy matches at or below this similarity are discarded.
const FUZZY_FLOOR: f64 = 0.5;

/// Confidence bonus when the page element's tag matches `expected_type`.
const TAG_BONUS: f64 = 0.10;

#[derive(Debug, Default)]
pub struct TestIdStrategy;

impl TestIdStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// Extract the first recognized test-ID literal from a selector.
pub fn extract_test_id(selector: &str) -> Option<(String, String)> {
    TEST_ID_RE
        .captures(selector)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
}

/// Score a page test-ID against the extracted one.
///
/// Returns the confidence and the match type, or `None` when the pair is
/// too dissimilar to propose.
pub fn score_test_id(extracted: &str, page_id: &str) -> Option<(f64, &'static str)> {
    if extracted.eq_ignore_ascii_case(page_id) {
        return Some((0.95, "exact"));
    }
    if normalize_identifier(extracted) == normalize_identifier(page_id) {
        return Some((0.90, "normalized"));
    }
    let extracted_lower = extracted.to_lowercase();
    let page_lower = page_id.to_lowercase();
    if page_lower.contains(&extracted_lower) {
        return Some((0.80, "contains"));
    }
    if extracted_lower.contains(&page_lower) {
        return Some((0.75, "contained-by"));
    }
    let similarity = levenshtein_similarity(extracted, page_id);
    if similarity > FUZZY_FLOOR {
        Some((similarity, "fuzzy"))
    } else {
        None
    }
}

#[async_trait]
impl HealingStrategy for TestIdStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TestIdRecovery
    }

    fn can_handle(&self, selector: &str) -> bool {
        TEST_ID_RE.is_match(selector)
    }

    async fn heal(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, StrategyError> {
        let Some((attr, extracted)) = extract_test_id(selector) else {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no test-id literal in selector",
            ));
        };
        debug!(%attr, %extracted, "recovering test-id selector");

        let elements = introspect::extract_test_id_elements(driver).await?;

        // Best score per distinct page test-ID; an ID carried by several
        // elements is proposed once.
        let mut scored: Vec<(String, f64, &'static str)> = Vec::new();
        for element in &elements {
            let Some(page_id) = element.test_id.as_deref() else {
                continue;
            };
            let Some((mut confidence, match_type)) = score_test_id(&extracted, page_id) else {
                continue;
            };
            if let Some(expected) = options.expected_type.as_deref()
                && element.tag.eq_ignore_ascii_case(expected)
            {
                confidence = (confidence + TAG_BONUS).min(1.0);
            }
            match scored.iter_mut().find(|(id, _, _)| id == page_id) {
                Some(existing) if existing.1 < confidence => {
                    existing.1 = confidence;
                    existing.2 = match_type;
                }
                Some(_) => {}
                None => scored.push((page_id.to_string(), confidence, match_type)),
            }
        }

        let mut candidates = Vec::new();
        for (page_id, confidence, match_type) in &scored {
            let escaped = escape_selector_text(page_id);
            for attr in RECOGNIZED_ATTRS {
                candidates.push(
                    Candidate::new(
                        format!("[{}=\"{}\"]", attr, escaped),
                        *confidence,
                        self.kind(),
                        format!("test id '{}' {} match for '{}'", page_id, match_type, extracted),
                    )
                    .with_metadata("match_type", Value::String(match_type.to_string())),
                );
            }
        }

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no similar test ids on page",
            ));
        }
        sort_candidates(&mut candidates);

        match super::validate_candidates(driver, candidates).await {
            Some(result) => Ok(result),
            None => Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no candidate selector resolved",
            )),
        }
    }
}

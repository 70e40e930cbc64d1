//! Visible-text matching.
//!
//! Handles selectors that query by display text (`text=`, `:has-text(...)`,
//! xpath `contains(...)`, framework helpers). The literal is compared
//! against the visible text of every extracted element, and surviving
//! elements are re-emitted as a family of selector variants ordered by how
//! much of the original intent they preserve.

use super::{HealOptions, HealingStrategy, StrategyError, escape_selector_text};
use crate::introspect;
use crate::similarity::{levenshtein_similarity, normalize_text, word_overlap};
use async_trait::async_trait;
use mend_common::{
    Candidate, Driver, ElementDescriptor, HealingResult, StrategyKind, sort_candidates,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static TEXT_QUERY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"text\s*=\s*"([^"]+)""#).expect("text= double-quoted"),
        Regex::new(r#"text\s*=\s*'([^']+)'"#).expect("text= single-quoted"),
        Regex::new(r#":has-text\(\s*"([^"]+)"\s*\)"#).expect("has-text double-quoted"),
        Regex::new(r#":has-text\(\s*'([^']+)'\s*\)"#).expect("has-text single-quoted"),
        Regex::new(r#"contains\([^,]+,\s*"([^"]+)"\s*\)"#).expect("xpath contains double-quoted"),
        Regex::new(r#"contains\([^,]+,\s*'([^']+)'\s*\)"#).expect("xpath contains single-quoted"),
        Regex::new(r#"getByText\(\s*["']([^"']+)["']"#).expect("getByText"),
        Regex::new(r#"(?:innerText|textContent)\s*=\s*["']([^"']+)["']"#).expect("innerText"),
        Regex::new(r#"text\s*=\s*(\S+)"#).expect("text= bare"),
    ]
});

/// Candidates below this similarity are not proposed.
const SIMILARITY_FLOOR: f64 = 0.80;

/// Confidence for a byte-equal page text.
const EXACT_CONFIDENCE: f64 = 0.95;

/// Confidence for a trim-equal page text.
const TRIM_EXACT_CONFIDENCE: f64 = 0.92;

/// Ceiling for fuzzy (non-exact) matches, keeping them below exact forms.
const FUZZY_CEILING: f64 = 0.90;

/// Confidence bonus when the element's tag matches `expected_type`.
const TAG_BONUS: f64 = 0.05;

/// Cap on validated candidates per call.
const MAX_CANDIDATES: usize = 10;

#[derive(Debug, Default)]
pub struct TextMatchStrategy;

impl TextMatchStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// Extract the text literal from a text-query selector.
pub fn extract_text(selector: &str) -> Option<String> {
    TEXT_QUERY_RES
        .iter()
        .find_map(|re| re.captures(selector).map(|cap| cap[1].to_string()))
}

/// Text similarity in `[0, 1]`, layered by input shape:
/// normalized equality, containment, edit distance for near-equal lengths,
/// word overlap for everything else.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);

    if na == nb {
        return 1.0;
    }
    if na.contains(&nb) || nb.contains(&na) {
        let shorter = na.chars().count().min(nb.chars().count());
        let longer = na.chars().count().max(nb.chars().count());
        if longer == 0 {
            return 1.0;
        }
        return 0.85 + (shorter as f64 / longer as f64) * 0.15;
    }
    let len_a = na.chars().count() as i64;
    let len_b = nb.chars().count() as i64;
    if (len_a - len_b).abs() < 10 {
        return levenshtein_similarity(&na, &nb);
    }
    word_overlap(&na, &nb)
}

/// Confidence for a page text given the searched text, or `None` below the
/// floor. Exact and trim-exact matches pin fixed confidences above any
/// fuzzy score.
pub fn text_confidence(searched: &str, page_text: &str) -> Option<f64> {
    if page_text == searched {
        return Some(EXACT_CONFIDENCE);
    }
    if page_text.trim() == searched.trim() {
        return Some(TRIM_EXACT_CONFIDENCE);
    }
    let similarity = text_similarity(searched, page_text);
    if similarity >= SIMILARITY_FLOOR {
        Some(similarity.min(FUZZY_CEILING))
    } else {
        None
    }
}

/// Selector variants for one surviving element, most specific first.
fn selector_variants(element: &ElementDescriptor, text: &str) -> Vec<String> {
    let escaped = escape_selector_text(text);
    let mut variants = vec![
        format!("text=\"{}\"", escaped),
        format!(":has-text(\"{}\")", escaped),
    ];
    if element.tag == "button" || element.tag == "a" {
        variants.push(format!("{}:has-text(\"{}\")", element.tag, escaped));
    }
    if let Some(role) = element.role.as_deref() {
        variants.push(format!(
            "[role=\"{}\"]:has-text(\"{}\")",
            escape_selector_text(role),
            escaped
        ));
    }
    if let Some(aria_label) = element.aria_label.as_deref() {
        variants.push(format!(
            "[aria-label=\"{}\"]",
            escape_selector_text(aria_label)
        ));
    }
    variants.push(format!("[title=\"{}\"]", escaped));
    if text.chars().count() > 20 {
        let prefix: String = text.chars().take(15).collect();
        variants.push(format!(":has-text(\"{}\")", escape_selector_text(&prefix)));
    }
    variants
}

#[async_trait]
impl HealingStrategy for TextMatchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextMatching
    }

    fn can_handle(&self, selector: &str) -> bool {
        extract_text(selector).is_some()
    }

    async fn heal(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, StrategyError> {
        let Some(searched) = extract_text(selector) else {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no text literal in selector",
            ));
        };
        debug!(%searched, "recovering text selector");

        let elements = introspect::extract_elements(
            driver,
            introspect::DEFAULT_MAX_ELEMENTS,
            introspect::DEFAULT_MAX_TEXT_LEN,
        )
        .await?;

        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        for element in &elements {
            let Some(page_text) = element.text.as_deref() else {
                continue;
            };
            let Some(mut confidence) = text_confidence(&searched, page_text) else {
                continue;
            };
            if let Some(expected) = options.expected_type.as_deref()
                && element.tag.eq_ignore_ascii_case(expected)
            {
                confidence = (confidence + TAG_BONUS).min(1.0);
            }
            for variant in selector_variants(element, page_text) {
                if !seen.insert(variant.clone()) {
                    continue;
                }
                candidates.push(Candidate::new(
                    variant,
                    confidence,
                    self.kind(),
                    format!("page text '{}' matches '{}'", page_text, searched),
                ));
            }
        }

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no similar text on page",
            ));
        }
        sort_candidates(&mut candidates);
        candidates.truncate(MAX_CANDIDATES);

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

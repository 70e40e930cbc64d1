//! Structural CSS transforms.
//!
//! Purely syntactic: the broken selector is parsed into shallow features
//! (ids, classes, tags, attribute fragments, `:nth-child` fragments,
//! descendant depth) and a fixed family of simplifying transforms is
//! emitted, each with an a-priori confidence. No DOM inspection beyond the
//! shared existence probes.
//!
//! The confidence table is empirical tuning; the ordering is preserved
//! exactly, including first-tag-first-class (0.62) ranking below
//! last-tag-all-classes (0.68).

use super::{HealOptions, HealingStrategy, StrategyError};
use async_trait::async_trait;
use mend_common::{Candidate, Driver, HealingResult, StrategyKind, sort_candidates};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#[-\w]+").expect("id pattern"));
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[-\w]+").expect("class pattern"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][-\w]*").expect("tag pattern"));
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]").expect("attribute pattern"));
static NTH_CHILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":nth-child\(\d+\)").expect("nth-child pattern"));

/// Shallow syntactic features of a selector.
#[derive(Debug, Clone)]
pub struct SelectorFeatures {
    /// Whitespace-separated element parts, combinators removed.
    pub parts: Vec<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub tags: Vec<String>,
    pub attributes: Vec<String>,
    pub has_nth_child: bool,
}

impl SelectorFeatures {
    pub fn parse(selector: &str) -> Self {
        let parts: Vec<String> = selector
            .split_whitespace()
            .filter(|t| !matches!(*t, ">" | "+" | "~"))
            .map(str::to_string)
            .collect();
        let tags = parts
            .iter()
            .filter_map(|p| TAG_RE.find(p).map(|m| m.as_str().to_string()))
            .collect();
        Self {
            ids: ID_RE
                .find_iter(selector)
                .map(|m| m.as_str().to_string())
                .collect(),
            classes: CLASS_RE
                .find_iter(selector)
                .map(|m| m.as_str().to_string())
                .collect(),
            tags,
            attributes: ATTR_RE
                .find_iter(selector)
                .map(|m| m.as_str().to_string())
                .collect(),
            has_nth_child: NTH_CHILD_RE.is_match(selector),
            parts,
        }
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }
}

/// Apply all transforms whose preconditions hold. Output order follows the
/// table; the caller sorts by confidence and de-duplicates.
pub fn transforms(selector: &str) -> Vec<(String, f64, &'static str)> {
    let features = SelectorFeatures::parse(selector);
    let depth = features.depth();
    let mut out: Vec<(String, f64, &'static str)> = Vec::new();

    // 1. Strip all #id fragments.
    if !features.ids.is_empty() && depth > 1 {
        out.push((
            cleanup(&ID_RE.replace_all(selector, "")),
            0.70,
            "without ids",
        ));
    }

    // 2. Strip :nth-child fragments.
    if features.has_nth_child {
        out.push((
            cleanup(&NTH_CHILD_RE.replace_all(selector, "")),
            0.75,
            "without nth-child",
        ));
    }

    // 3. Keep the last two parts.
    if depth > 2 {
        out.push((
            features.parts[depth - 2..].join(" "),
            0.65,
            "last two parts",
        ));
    }

    // 4. All classes concatenated.
    if !features.classes.is_empty() {
        out.push((features.classes.concat(), 0.60, "all classes"));
    }

    // 5. Each class singly.
    for class in &features.classes {
        out.push((class.clone(), 0.55, "single class"));
    }

    // 6. Last tag + all classes.
    if let Some(last_tag) = features.tags.last()
        && !features.classes.is_empty()
    {
        out.push((
            format!("{}{}", last_tag, features.classes.concat()),
            0.68,
            "last tag with classes",
        ));
    }

    // 7. Child combinator between all parts.
    if depth > 1 {
        out.push((features.parts.join(" > "), 0.58, "child combinators"));
    }

    // 8. Each bracketed attribute fragment alone.
    for attribute in &features.attributes {
        out.push((attribute.clone(), 0.72, "attribute only"));
    }

    // 9. First tag + first class.
    if let (Some(first_tag), Some(first_class)) = (features.tags.first(), features.classes.first())
    {
        out.push((
            format!("{}{}", first_tag, first_class),
            0.62,
            "first tag with class",
        ));
    }

    // 10. Last tag alone.
    if let Some(last_tag) = features.tags.last() {
        out.push((last_tag.clone(), 0.50, "last tag"));
    }

    // 11. Drop the last part.
    if depth > 1 {
        out.push((
            features.parts[..depth - 1].join(" "),
            0.45,
            "without last part",
        ));
    }

    out
}

/// Tidy a selector after fragment removal: drop empty tokens and dangling
/// or doubled combinators.
fn cleanup(selector: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in selector.split_whitespace() {
        let is_combinator = matches!(token, ">" | "+" | "~");
        if is_combinator && matches!(tokens.last(), None | Some(&">") | Some(&"+") | Some(&"~")) {
            continue;
        }
        tokens.push(token);
    }
    while matches!(tokens.last(), Some(&">") | Some(&"+") | Some(&"~")) {
        tokens.pop();
    }
    tokens.join(" ")
}

#[derive(Debug, Default)]
pub struct CssHierarchyStrategy;

impl CssHierarchyStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealingStrategy for CssHierarchyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CssHierarchy
    }

    fn can_handle(&self, selector: &str) -> bool {
        !selector.trim().is_empty()
    }

    async fn heal(
        &self,
        driver: &mut dyn Driver,
        selector: &str,
        _options: &HealOptions,
    ) -> Result<HealingResult, StrategyError> {
        let mut candidates: Vec<Candidate> = Vec::new();
        for (transformed, confidence, rationale) in transforms(selector) {
            if transformed.is_empty() || transformed == selector {
                continue;
            }
            candidates.push(Candidate::new(
                transformed,
                confidence,
                self.kind(),
                rationale,
            ));
        }

        sort_candidates(&mut candidates);
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.selector.clone()));

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                selector,
                Some(self.kind()),
                "no structural transforms apply",
            ));
        }

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

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN: &str = "div#app > main.content > section:nth-child(3) > button#submit";

    fn transform_set(selector: &str) -> Vec<(String, f64)> {
        transforms(selector)
            .into_iter()
            .map(|(s, c, _)| (s, c))
            .collect()
    }

    #[test]
    fn parses_shallow_features() {
        let features = SelectorFeatures::parse(BROKEN);
        assert_eq!(features.depth(), 4);
        assert_eq!(features.ids, vec!["#app", "#submit"]);
        assert_eq!(features.classes, vec![".content"]);
        assert_eq!(features.tags, vec!["div", "main", "section", "button"]);
        assert!(features.has_nth_child);
        assert!(features.attributes.is_empty());
    }

    #[test]
    fn emits_documented_transforms() {
        let set = transform_set(BROKEN);
        assert!(set.contains(&(
            "div > main.content > section:nth-child(3) > button".to_string(),
            0.70
        )));
        assert!(set.contains(&(
            "div#app > main.content > section > button#submit".to_string(),
            0.75
        )));
        assert!(set.contains(&(
            "section:nth-child(3) button#submit".to_string(),
            0.65
        )));
        assert!(set.contains(&(".content".to_string(), 0.60)));
        assert!(set.contains(&(".content".to_string(), 0.55)));
        assert!(set.contains(&("button.content".to_string(), 0.68)));
        assert!(set.contains(&("div.content".to_string(), 0.62)));
        assert!(set.contains(&("button".to_string(), 0.50)));
        assert!(set.contains(&(
            "div#app main.content section:nth-child(3)".to_string(),
            0.45
        )));
    }

    #[test]
    fn attribute_fragments_rank_highest_without_nth_child() {
        let set = transform_set("form [type=\"submit\"] .primary");
        assert!(set.contains(&("[type=\"submit\"]".to_string(), 0.72)));
    }

    #[test]
    fn flat_selector_yields_only_applicable_transforms() {
        let set = transform_set("button");
        // No ids, classes, nth-child, attributes, depth 1: only "last tag".
        assert_eq!(set, vec![("button".to_string(), 0.50)]);
    }

    #[test]
    fn preserves_empirical_ordering() {
        // First-tag-first-class (0.62) stays below last-tag-all-classes (0.68).
        let set = transform_set("div.wrapper button.save");
        let tag_class_pos = set.iter().position(|(s, _)| s == "button.wrapper.save");
        let first_pos = set.iter().position(|(s, _)| s == "div.wrapper");
        assert!(tag_class_pos.is_some());
        assert!(first_pos.is_some());
        let by_conf = |p: usize| set[p].1;
        assert!(by_conf(tag_class_pos.unwrap()) > by_conf(first_pos.unwrap()));
    }

    #[test]
    fn cleanup_drops_dangling_combinators() {
        assert_eq!(cleanup("div >  > button"), "div > button");
        assert_eq!(cleanup(" > button"), "button");
        assert_eq!(cleanup("div > "), "div");
    }
}

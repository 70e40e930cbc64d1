use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Identifies which healing strategy produced a candidate or result.
///
/// The wire names double as the configuration tags in `strategies: [...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "data-testid-recovery")]
    TestIdRecovery,
    #[serde(rename = "text-matching")]
    TextMatching,
    #[serde(rename = "css-hierarchy")]
    CssHierarchy,
    #[serde(rename = "llm-analysis")]
    LlmAnalysis,
}

impl StrategyKind {
    /// All strategies in default dispatch order.
    pub fn all() -> Vec<StrategyKind> {
        vec![
            StrategyKind::TestIdRecovery,
            StrategyKind::TextMatching,
            StrategyKind::CssHierarchy,
            StrategyKind::LlmAnalysis,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TestIdRecovery => "data-testid-recovery",
            StrategyKind::TextMatching => "text-matching",
            StrategyKind::CssHierarchy => "css-hierarchy",
            StrategyKind::LlmAnalysis => "llm-analysis",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "data-testid-recovery" => Ok(StrategyKind::TestIdRecovery),
            "text-matching" => Ok(StrategyKind::TextMatching),
            "css-hierarchy" => Ok(StrategyKind::CssHierarchy),
            "llm-analysis" => Ok(StrategyKind::LlmAnalysis),
            other => Err(format!("unknown strategy tag: {}", other)),
        }
    }
}

/// Snapshot of one DOM element taken by the introspector.
///
/// Descriptors are per-healing-call ephemera: extracted once, handed to the
/// strategies read-only, and never retained across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementDescriptor {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub test_id: Option<String>,
    /// Which recognized attribute carried `test_id` (e.g. `data-cy`).
    pub test_id_attr: Option<String>,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub visible: bool,
    pub parent: Option<ParentInfo>,
}

impl Default for ElementDescriptor {
    fn default() -> Self {
        Self {
            tag: String::new(),
            id: None,
            classes: vec![],
            text: None,
            test_id: None,
            test_id_attr: None,
            role: None,
            aria_label: None,
            input_type: None,
            name: None,
            title: None,
            visible: true,
            parent: None,
        }
    }
}

/// Immediate-parent context for a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentInfo {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// A proposed replacement selector with an a-priori confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub selector: String,
    pub confidence: f64,
    pub strategy: StrategyKind,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Candidate {
    /// Build a candidate with the confidence clamped to `[0, 1]`.
    pub fn new(
        selector: impl Into<String>,
        confidence: f64,
        strategy: StrategyKind,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            confidence: confidence.clamp(0.0, 1.0),
            strategy,
            rationale: rationale.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Sort candidates by confidence descending, preserving generation order
/// between equal confidences.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Sole return contract of every healing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingResult {
    pub success: bool,
    /// The healed selector on success, the original otherwise.
    pub selector: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    /// Other ranked candidates that were not tested or failed validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl HealingResult {
    pub fn healed(selector: impl Into<String>, confidence: f64, strategy: StrategyKind) -> Self {
        Self {
            success: true,
            selector: selector.into(),
            confidence: confidence.clamp(0.0, 1.0),
            strategy: Some(strategy),
            alternatives: vec![],
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(
        selector: impl Into<String>,
        strategy: Option<StrategyKind>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            selector: selector.into(),
            confidence: 0.0,
            strategy,
            alternatives: vec![],
            error: Some(error.into()),
            metadata: Map::new(),
        }
    }

    pub fn disabled(selector: impl Into<String>) -> Self {
        Self::failure(selector, None, "disabled")
    }

    /// The original selector still resolves; nothing to heal.
    pub fn no_healing_needed(selector: impl Into<String>) -> Self {
        let mut result = Self {
            success: true,
            selector: selector.into(),
            confidence: 1.0,
            strategy: None,
            alternatives: vec![],
            error: None,
            metadata: Map::new(),
        };
        result
            .metadata
            .insert("no_healing_needed".into(), Value::Bool(true));
        result
    }

    pub fn with_alternatives(mut self, alternatives: Vec<Candidate>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when this result came out of the healing cache.
    pub fn is_cached(&self) -> bool {
        self.metadata.get("cached").and_then(Value::as_bool) == Some(true)
    }
}

/// Interactions routed through the action wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Click,
    Fill(String),
    Type(String),
    Select(String),
    Check,
    Uncheck,
    Screenshot(Option<PathBuf>),
    Goto(String),
}

impl Interaction {
    /// Interactions that target an element and therefore heal on failure.
    pub fn targets_element(&self) -> bool {
        !matches!(self, Interaction::Screenshot(_) | Interaction::Goto(_))
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Interaction::Click => "click",
            Interaction::Fill(_) => "fill",
            Interaction::Type(_) => "type",
            Interaction::Select(_) => "select",
            Interaction::Check => "check",
            Interaction::Uncheck => "uncheck",
            Interaction::Screenshot(_) => "screenshot",
            Interaction::Goto(_) => "goto",
        }
    }
}

/// Outcome of a driver interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Raw bytes for interactions that produce data (screenshot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
}

impl InteractionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_tags_round_trip() {
        for kind in StrategyKind::all() {
            let parsed: StrategyKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("screenshot-diff".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn candidate_confidence_is_clamped() {
        let high = Candidate::new("#a", 1.7, StrategyKind::TestIdRecovery, "r");
        let low = Candidate::new("#b", -0.3, StrategyKind::TestIdRecovery, "r");
        assert_eq!(high.confidence, 1.0);
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut candidates = vec![
            Candidate::new("#first", 0.8, StrategyKind::CssHierarchy, "r"),
            Candidate::new("#second", 0.9, StrategyKind::CssHierarchy, "r"),
            Candidate::new("#third", 0.8, StrategyKind::CssHierarchy, "r"),
        ];
        sort_candidates(&mut candidates);
        let order: Vec<&str> = candidates.iter().map(|c| c.selector.as_str()).collect();
        assert_eq!(order, vec!["#second", "#first", "#third"]);
    }

    #[test]
    fn no_healing_needed_carries_marker() {
        let result = HealingResult::no_healing_needed("#ok");
        assert!(result.success);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(
            result.metadata.get("no_healing_needed"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn descriptor_accepts_partial_payload() {
        let descriptor: ElementDescriptor =
            serde_json::from_str(r#"{"tag":"button","text":"Save","visible":true}"#).unwrap();
        assert_eq!(descriptor.tag, "button");
        assert_eq!(descriptor.text.as_deref(), Some("Save"));
        assert!(descriptor.classes.is_empty());
    }
}

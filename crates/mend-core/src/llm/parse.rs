//! Parsing of LLM generation output.
//!
//! The model is asked for a strict JSON object but treated as an unreliable
//! collaborator: parsing degrades through three layers before giving up.
//!
//! 1. The first balanced JSON object containing a `"suggestions"` array.
//! 2. Any `"selector": "..."` pairs anywhere in the text.
//! 3. Raw-text scan for selector-shaped literals (bracket-quoted test-ID or
//!    role attributes, `text=` queries, `:has-text(...)` forms).

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// One parsed suggestion. Confidence is clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub selector: String,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    selector: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

static SELECTOR_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""selector"\s*:\s*"((?:[^"\\]|\\.)+)""#).expect("selector field pattern")
});

static SELECTOR_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"\[(?:data-testid|data-test-id|data-cy|data-test|testid|role)\s*=\s*"[^"]+"\]"#,
        r#"|text\s*=\s*"[^"]+""#,
        r#"|[\w.#\[\]"'=-]*:has-text\("[^"]+"\)"#,
    ))
    .expect("selector shape pattern")
});

/// Fallback confidence for suggestions recovered without a declared score.
const SCANNED_CONFIDENCE: f64 = 0.5;

/// Parse generation output into at most `cap` deduplicated suggestions,
/// ordered by declared confidence descending.
pub fn parse_suggestions(raw: &str, cap: usize) -> Vec<Suggestion> {
    let mut suggestions = parse_envelope(raw)
        .or_else(|| scan_selector_fields(raw))
        .or_else(|| scan_selector_shapes(raw))
        .unwrap_or_default();

    dedup_by_selector(&mut suggestions);
    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    suggestions.truncate(cap);
    suggestions
}

/// Layer 1: locate and parse the first balanced JSON object that contains a
/// `suggestions` array.
fn parse_envelope(raw: &str) -> Option<Vec<Suggestion>> {
    let bytes = raw.as_bytes();
    for (start, _) in raw.char_indices().filter(|(_, c)| *c == '{') {
        let Some(end) = balanced_object_end(bytes, start) else {
            continue;
        };
        let slice = &raw[start..=end];
        if !slice.contains("\"suggestions\"") {
            continue;
        }
        if let Ok(envelope) = serde_json::from_str::<Envelope>(slice) {
            let parsed = envelope
                .suggestions
                .into_iter()
                .map(|s| Suggestion {
                    selector: s.selector,
                    confidence: s.confidence.unwrap_or(SCANNED_CONFIDENCE).clamp(0.0, 1.0),
                    reasoning: s.reasoning.unwrap_or_default(),
                })
                .filter(|s| !s.selector.trim().is_empty())
                .collect::<Vec<_>>();
            if !parsed.is_empty() {
                return Some(parsed);
            }
        }
    }
    None
}

/// Find the index of the `}` closing the object that opens at `start`,
/// skipping over string literals.
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Layer 2: any quoted `"selector"` fields, in order of appearance.
fn scan_selector_fields(raw: &str) -> Option<Vec<Suggestion>> {
    let found: Vec<Suggestion> = SELECTOR_FIELD_RE
        .captures_iter(raw)
        .map(|cap| Suggestion {
            selector: unescape_json_string(&cap[1]),
            confidence: SCANNED_CONFIDENCE,
            reasoning: "recovered from selector field".to_string(),
        })
        .collect();
    if found.is_empty() { None } else { Some(found) }
}

/// Layer 3: selector-shaped literals in free text.
fn scan_selector_shapes(raw: &str) -> Option<Vec<Suggestion>> {
    let found: Vec<Suggestion> = SELECTOR_SHAPE_RE
        .find_iter(raw)
        .map(|m| Suggestion {
            selector: m.as_str().to_string(),
            confidence: SCANNED_CONFIDENCE,
            reasoning: "recovered from raw text".to_string(),
        })
        .collect();
    if found.is_empty() { None } else { Some(found) }
}

fn unescape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.next()
        {
            match next {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                other => out.push(other),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn dedup_by_selector(suggestions: &mut Vec<Suggestion>) {
    let mut seen = std::collections::HashSet::new();
    suggestions.retain(|s| seen.insert(s.selector.clone()));
}

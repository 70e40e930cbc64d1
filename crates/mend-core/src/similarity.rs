//! String similarity kernels shared by the healing strategies.
//!
//! Test-ID recovery scores identifiers with edit distance and a
//! normalization pass; text matching layers containment, edit distance and
//! word overlap depending on the inputs. The constants the strategies apply
//! on top of these kernels live with the strategies.

/// Classic Levenshtein edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Edit-distance similarity in `[0, 1]`: `1 - dist / max(len)`.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Normalize an identifier for loose equality: lowercase with `-`, `_`
/// and whitespace removed. `submitBtn` and `submit-btn` normalize equal.
pub fn normalize_identifier(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize display text for comparison: lowercase, trimmed, inner
/// whitespace collapsed.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word-overlap similarity over tokens longer than two characters,
/// normalized by the larger token count.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = significant_tokens(a);
    let tokens_b = significant_tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared = tokens_a.iter().filter(|t| tokens_b.contains(*t)).count();
    shared as f64 / tokens_a.len().max(tokens_b.len()) as f64
}

fn significant_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("submit-btn", "submit-btn"), 0);
    }

    #[test]
    fn levenshtein_similarity_range() {
        assert_eq!(levenshtein_similarity("", ""), 1.0);
        assert_eq!(levenshtein_similarity("abc", "abc"), 1.0);
        assert_eq!(levenshtein_similarity("abc", "xyz"), 0.0);
        let sim = levenshtein_similarity("submit-btn", "submit-button");
        assert!(sim > 0.5 && sim < 1.0);
    }

    #[test]
    fn identifier_normalization() {
        assert_eq!(normalize_identifier("submitBtn"), "submitbtn");
        assert_eq!(normalize_identifier("submit-btn"), "submitbtn");
        assert_eq!(normalize_identifier("submit_btn "), "submitbtn");
        assert_eq!(
            normalize_identifier("submitBtn"),
            normalize_identifier("submit-btn")
        );
    }

    #[test]
    fn text_normalization_collapses_whitespace() {
        assert_eq!(normalize_text("  Sign\t In \n"), "sign in");
    }

    #[test]
    fn word_overlap_ignores_short_tokens() {
        // "to" and "a" are dropped; "add" / "cart" overlap fully.
        let sim = word_overlap("Add to cart", "Add a cart");
        assert_eq!(sim, 1.0);
        assert_eq!(word_overlap("Submit order", "Cancel payment"), 0.0);
    }

    #[test]
    fn word_overlap_partial() {
        let sim = word_overlap("Submit your order", "Submit order now");
        // 2 shared of max 3 tokens.
        assert!((sim - 2.0 / 3.0).abs() < 1e-9);
    }
}

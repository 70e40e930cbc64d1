//! DOM introspection.
//!
//! The introspector is the only component that reads the live page. Each
//! strategy invocation triggers at most one extraction, executed through
//! `Driver::introspect` as a single self-contained program, and decoded
//! straight into `ElementDescriptor`s.

use mend_common::{Driver, DriverError, ElementDescriptor};
use serde_json::json;

/// Default cap on extracted elements per call.
pub const DEFAULT_MAX_ELEMENTS: usize = 500;

/// Default cap on captured element text, in characters.
pub const DEFAULT_MAX_TEXT_LEN: usize = 200;

/// Full-page extraction: every visible element outside non-visual tags,
/// bounded by `max_elements`. Raw text longer than 999 characters is not
/// captured; captured text is truncated to `max_text_len`.
const EXTRACT_ELEMENTS_JS: &str = r#"
var maxElements = args.max_elements;
var maxText = args.max_text_len;
var skipTags = { SCRIPT: true, STYLE: true, NOSCRIPT: true, HEAD: true };
var testIdAttrs = ['data-testid', 'data-test-id', 'data-cy', 'data-test', 'testid'];
var out = [];
var all = document.querySelectorAll('*');
for (var i = 0; i < all.length && out.length < maxElements; i++) {
    var el = all[i];
    if (skipTags[el.tagName]) continue;
    var style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
        continue;
    }
    var text = (el.textContent || '').trim();
    if (text.length === 0 || text.length > 999) {
        text = null;
    } else if (text.length > maxText) {
        text = text.substring(0, maxText);
    }
    var testId = null;
    var testIdAttr = null;
    for (var t = 0; t < testIdAttrs.length; t++) {
        var v = el.getAttribute(testIdAttrs[t]);
        if (v) { testId = v; testIdAttr = testIdAttrs[t]; break; }
    }
    var parent = null;
    if (el.parentElement && el.parentElement !== document.documentElement) {
        parent = {
            tag: el.parentElement.tagName.toLowerCase(),
            classes: Array.prototype.slice.call(el.parentElement.classList)
        };
    }
    out.push({
        tag: el.tagName.toLowerCase(),
        id: el.id || null,
        classes: Array.prototype.slice.call(el.classList),
        text: text,
        test_id: testId,
        test_id_attr: testIdAttr,
        role: el.getAttribute('role'),
        aria_label: el.getAttribute('aria-label'),
        type: el.getAttribute('type'),
        name: el.getAttribute('name'),
        title: el.getAttribute('title'),
        visible: true,
        parent: parent
    });
}
return out;
"#;

/// Test-ID extraction: every element carrying a recognized stable-ID
/// attribute, hidden or not.
const EXTRACT_TEST_IDS_JS: &str = r#"
var testIdAttrs = ['data-testid', 'data-test-id', 'data-cy', 'data-test', 'testid'];
var out = [];
var seen = [];
for (var a = 0; a < testIdAttrs.length; a++) {
    var attr = testIdAttrs[a];
    var matches = document.querySelectorAll('[' + attr + ']');
    for (var i = 0; i < matches.length; i++) {
        var el = matches[i];
        if (seen.indexOf(el) !== -1) continue;
        seen.push(el);
        var style = window.getComputedStyle(el);
        var visible = style.display !== 'none'
            && style.visibility !== 'hidden'
            && style.opacity !== '0';
        var text = (el.textContent || '').trim();
        out.push({
            tag: el.tagName.toLowerCase(),
            id: el.id || null,
            classes: Array.prototype.slice.call(el.classList),
            text: text.length > 0 ? text.substring(0, 200) : null,
            test_id: el.getAttribute(attr),
            test_id_attr: attr,
            role: el.getAttribute('role'),
            aria_label: el.getAttribute('aria-label'),
            type: el.getAttribute('type'),
            name: el.getAttribute('name'),
            title: el.getAttribute('title'),
            visible: visible,
            parent: null
        });
    }
}
return out;
"#;

/// Extract descriptors for visible elements, bounded by `max_elements`.
pub async fn extract_elements(
    driver: &mut dyn Driver,
    max_elements: usize,
    max_text_len: usize,
) -> Result<Vec<ElementDescriptor>, DriverError> {
    let args = json!({
        "max_elements": max_elements,
        "max_text_len": max_text_len,
    });
    let value = driver.introspect(EXTRACT_ELEMENTS_JS, args).await?;
    decode(value)
}

/// Extract descriptors for every element carrying a recognized test-ID
/// attribute.
pub async fn extract_test_id_elements(
    driver: &mut dyn Driver,
) -> Result<Vec<ElementDescriptor>, DriverError> {
    let value = driver
        .introspect(EXTRACT_TEST_IDS_JS, serde_json::Value::Null)
        .await?;
    decode(value)
}

fn decode(value: serde_json::Value) -> Result<Vec<ElementDescriptor>, DriverError> {
    serde_json::from_value(value)
        .map_err(|e| DriverError::Script(format!("malformed introspection payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_accepts_extraction_shape() {
        let payload = json!([
            {
                "tag": "button",
                "id": "save",
                "classes": ["btn", "btn-primary"],
                "text": "Save changes",
                "test_id": "save-btn",
                "test_id_attr": "data-testid",
                "role": null,
                "aria_label": null,
                "type": "submit",
                "name": null,
                "title": null,
                "visible": true,
                "parent": { "tag": "form", "classes": ["settings"] }
            }
        ]);
        let descriptors = decode(payload).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].tag, "button");
        assert_eq!(descriptors[0].test_id.as_deref(), Some("save-btn"));
        assert_eq!(descriptors[0].parent.as_ref().unwrap().tag, "form");
    }

    #[test]
    fn decode_rejects_non_array() {
        assert!(decode(json!({"tag": "button"})).is_err());
    }
}

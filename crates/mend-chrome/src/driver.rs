//! `Driver` implementation over CDP.
//!
//! The engine's strategies emit more than plain CSS: exact-text queries
//! (`text="..."`), `:has-text("...")` forms, and xpath. Resolution of all
//! of these happens in-page through one selector engine so that probing,
//! waiting and interacting agree on what a selector means.

use crate::cdp::CdpClient;
use async_trait::async_trait;
use mend_common::{Driver, DriverError, Interaction, InteractionOutcome, WaitState};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Upper bound on one JS evaluation; dialogs cannot block us (they are
/// auto-accepted) but a hung page should not hang the engine.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval for `wait`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// In-page selector engine shared by probe, wait and interact.
const SELECTOR_ENGINE_JS: &str = r#"
function __mendResolve(selector) {
    function textOf(el) { return (el.textContent || '').trim(); }
    function unescape(s) { return s.replace(/\\(.)/g, '$1'); }
    var m;
    m = selector.match(/^text\s*=\s*"((?:[^"\\]|\\.)*)"$/)
        || selector.match(/^text\s*=\s*'([^']*)'$/)
        || selector.match(/^text\s*=\s*([^"'].*)$/);
    if (m) {
        var wanted = unescape(m[1]);
        var out = [];
        var all = document.querySelectorAll('*');
        for (var i = 0; i < all.length; i++) {
            if (textOf(all[i]) === wanted) out.push(all[i]);
        }
        return out;
    }
    m = selector.match(/^(.*?):has-text\(\s*"((?:[^"\\]|\\.)*)"\s*\)$/);
    if (m) {
        var base = m[1] || '*';
        var needle = unescape(m[2]);
        var found = [];
        var candidates;
        try { candidates = document.querySelectorAll(base); } catch (e) { return []; }
        for (var j = 0; j < candidates.length; j++) {
            if (textOf(candidates[j]).indexOf(needle) !== -1) found.push(candidates[j]);
        }
        return found;
    }
    if (selector.indexOf('xpath=') === 0 || selector.indexOf('//') === 0) {
        var expr = selector.indexOf('xpath=') === 0 ? selector.substring(6) : selector;
        var nodes = [];
        try {
            var snapshot = document.evaluate(
                expr, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (var k = 0; k < snapshot.snapshotLength; k++) {
                nodes.push(snapshot.snapshotItem(k));
            }
        } catch (e) { return []; }
        return nodes;
    }
    try {
        return Array.prototype.slice.call(document.querySelectorAll(selector));
    } catch (e) { return []; }
}
function __mendVisible(el) {
    var style = window.getComputedStyle(el);
    return style.display !== 'none'
        && style.visibility !== 'hidden'
        && style.opacity !== '0';
}
"#;

pub struct ChromeDriver {
    client: CdpClient,
}

impl ChromeDriver {
    /// Launch a fresh browser session.
    pub async fn launch(visible: bool) -> Result<Self, DriverError> {
        let client = CdpClient::launch(visible)
            .await
            .map_err(|e| DriverError::Other(format!("browser launch failed: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), DriverError> {
        self.client
            .close()
            .await
            .map_err(|e| DriverError::Other(format!("browser close failed: {}", e)))
    }

    async fn evaluate(&self, expression: String) -> Result<Value, DriverError> {
        let eval = tokio::time::timeout(EVAL_TIMEOUT, self.client.page.evaluate(expression))
            .await
            .map_err(|_| {
                DriverError::Other(format!(
                    "script evaluation exceeded timeout of {} ms",
                    EVAL_TIMEOUT.as_millis()
                ))
            })?
            .map_err(|e| DriverError::Script(e.to_string()))?;
        eval.into_value::<Value>()
            .map_err(|e| DriverError::Script(format!("script returned no value: {}", e)))
    }

    fn engine_call(body: &str) -> String {
        format!("(function() {{ {} {} }})()", SELECTOR_ENGINE_JS, body)
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let body = format!(
            "return __mendResolve({}).length;",
            Value::String(selector.to_string())
        );
        let value = self.evaluate(Self::engine_call(&body)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn any_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let body = format!(
            "var els = __mendResolve({});\n\
             for (var i = 0; i < els.length; i++) {{\n\
                 if (__mendVisible(els[i])) return true;\n\
             }}\n\
             return false;",
            Value::String(selector.to_string())
        );
        let value = self.evaluate(Self::engine_call(&body)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Navigate and report the landing URL.
    async fn goto(&mut self, url: &str) -> Result<InteractionOutcome, DriverError> {
        info!("Navigating to: {}", url);
        self.client
            .page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(InteractionOutcome {
            success: true,
            message: Some(format!("navigated to {}", url)),
            bytes: None,
        })
    }

    async fn screenshot(
        &mut self,
        path: Option<&std::path::Path>,
    ) -> Result<InteractionOutcome, DriverError> {
        let bytes = self
            .client
            .page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Other(format!("screenshot failed: {}", e)))?;
        if let Some(path) = path {
            tokio::fs::write(path, &bytes)
                .await
                .map_err(|e| DriverError::Other(format!("screenshot write failed: {}", e)))?;
            return Ok(InteractionOutcome {
                success: true,
                message: Some(format!("screenshot saved to {}", path.display())),
                bytes: None,
            });
        }
        Ok(InteractionOutcome {
            success: true,
            message: None,
            bytes: Some(bytes),
        })
    }

    /// Element interactions are dispatched in-page so they resolve through
    /// the same selector engine as probing.
    async fn element_action(
        &mut self,
        selector: &str,
        action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError> {
        let action_js = match action {
            Interaction::Click => "el.click();".to_string(),
            Interaction::Fill(value) => fill_js(value, false),
            Interaction::Type(value) => fill_js(value, true),
            Interaction::Select(value) => select_js(value),
            Interaction::Check => check_js(true),
            Interaction::Uncheck => check_js(false),
            other => {
                return Err(DriverError::Other(format!(
                    "interaction '{}' does not target an element",
                    other.verb()
                )));
            }
        };
        let body = format!(
            "var els = __mendResolve({selector});\n\
             if (els.length === 0) return {{ found: false }};\n\
             var el = els[0];\n\
             if (!__mendVisible(el)) return {{ found: true, actionable: false, state: 'not visible' }};\n\
             {action_js}\n\
             return {{ found: true, actionable: true }};",
            selector = Value::String(selector.to_string()),
            action_js = action_js,
        );
        let value = self.evaluate(Self::engine_call(&body)).await?;

        let found = value.get("found").and_then(Value::as_bool).unwrap_or(false);
        if !found {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        let actionable = value
            .get("actionable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !actionable {
            let state = value
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("not actionable")
                .to_string();
            return Err(DriverError::NotActionable {
                selector: selector.to_string(),
                state,
            });
        }
        Ok(InteractionOutcome::ok())
    }
}

fn fill_js(value: &str, append: bool) -> String {
    let value_json = Value::String(value.to_string());
    let assign = if append {
        "el.value = el.value + v;"
    } else {
        "el.value = v;"
    };
    format!(
        "var v = {value_json};\n\
         var tag = el.tagName.toLowerCase();\n\
         if (tag === 'input' || tag === 'textarea') {{\n\
             el.focus();\n\
             {assign}\n\
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
         }} else if (el.isContentEditable) {{\n\
             el.focus();\n\
             el.textContent = v;\n\
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
         }} else {{\n\
             return {{ found: true, actionable: false, state: 'not actionable' }};\n\
         }}"
    )
}

fn select_js(value: &str) -> String {
    let value_json = Value::String(value.to_string());
    format!(
        "var v = {value_json};\n\
         if (el.tagName.toLowerCase() !== 'select') {{\n\
             return {{ found: true, actionable: false, state: 'not actionable' }};\n\
         }}\n\
         var matched = false;\n\
         for (var i = 0; i < el.options.length; i++) {{\n\
             var o = el.options[i];\n\
             if (o.value === v || o.label === v || o.text === v) {{\n\
                 el.value = o.value;\n\
                 matched = true;\n\
                 break;\n\
             }}\n\
         }}\n\
         if (!matched) return {{ found: true, actionable: false, state: 'not actionable' }};\n\
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
    )
}

fn check_js(state: bool) -> String {
    format!(
        "if (el.type !== 'checkbox' && el.type !== 'radio') {{\n\
             return {{ found: true, actionable: false, state: 'not actionable' }};\n\
         }}\n\
         el.checked = {state};\n\
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
    )
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn probe(&mut self, selector: &str) -> Result<usize, DriverError> {
        let count = self.count(selector).await?;
        debug!(%selector, count, "probe");
        Ok(count)
    }

    async fn wait(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let satisfied = match state {
                WaitState::Attached => self.count(selector).await? >= 1,
                WaitState::Visible => self.any_visible(selector).await?,
            };
            if satisfied {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn introspect(&mut self, code: &str, args: Value) -> Result<Value, DriverError> {
        let expression = format!("(function(args) {{ {} }})({})", code, args);
        self.evaluate(expression).await
    }

    async fn interact(
        &mut self,
        selector: &str,
        action: &Interaction,
    ) -> Result<InteractionOutcome, DriverError> {
        match action {
            Interaction::Goto(url) => self.goto(url).await,
            Interaction::Screenshot(path) => self.screenshot(path.as_deref()).await,
            element_bound => self.element_action(selector, element_bound).await,
        }
    }

    async fn url(&mut self) -> Result<String, DriverError> {
        Ok(self
            .client
            .page
            .url()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?
            .unwrap_or_default())
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok(self
            .client
            .page
            .get_title()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?
            .unwrap_or_default())
    }
}

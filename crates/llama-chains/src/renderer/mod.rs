//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The scraper
//! only ever talks to these traits, so tests can drive it with a synthetic
//! page.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    ///
    /// Scripts that evaluate to `undefined` yield `Value::Null`.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Rendered text (`innerText`) of every element matching `selector`,
    /// in document order.
    async fn query_text(&self, selector: &str) -> Result<Vec<String>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Build a script that returns the `innerText` of every match of `selector`.
pub fn query_text_script(selector: &str) -> String {
    // serde_json quoting doubles as a JS string literal.
    let literal = serde_json::Value::String(selector.to_string()).to_string();
    format!("Array.from(document.querySelectorAll({literal}), el => el.innerText)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text_script_quotes_selector() {
        let script = query_text_script("div.sc-af4250f5-0.fYBVwr");
        assert_eq!(
            script,
            "Array.from(document.querySelectorAll(\"div.sc-af4250f5-0.fYBVwr\"), el => el.innerText)"
        );
    }

    #[test]
    fn test_query_text_script_escapes_quotes() {
        let script = query_text_script(r#"a[title="x"]"#);
        assert!(script.contains(r#""a[title=\"x\"]""#));
    }
}

//! Chromium-based renderer using chromiumoxide.

use super::{query_text_script, NavigationResult, RenderContext, Renderer};
use crate::config::BrowserOptions;
use crate::stealth;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Find a Chromium or Chrome binary.
///
/// Looks in `~/.llama-chains/chromium/` first, then on `PATH`, then in the
/// usual macOS application bundle.
pub fn find_chromium() -> Option<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        let root = home.join(".llama-chains/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                root.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome"),
            ]
        } else {
            vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance configured from `options`.
    ///
    /// Every launch picks a fresh desktop user agent; the proxy, when set,
    /// is passed straight through as `--proxy-server`.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = match &options.chromium_path {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => bail!("Chromium binary not found at {}", path.display()),
            None => find_chromium()
                .context("Chromium not found. Install Chrome/Chromium or set CHROMIUM_PATH.")?,
        };
        info!("using browser binary: {}", chrome_path.display());

        let user_agent = stealth::random_user_agent();
        info!("using user agent: {user_agent}");
        if let Some(proxy) = &options.proxy {
            info!("using proxy server: {proxy}");
        }

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        for arg in stealth::launch_args(user_agent, options.proxy.as_deref()) {
            builder = builder.arg(arg);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.context("failed to close browser");
        if closed.is_ok() {
            let _ = browser.wait().await;
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                let load_time_ms = start.elapsed().as_millis() as u64;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        let value = self.execute_js(&query_text_script(selector)).await?;
        serde_json::from_value(value)
            .with_context(|| format!("unexpected result for selector {selector:?}"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_query_text_and_scroll_extent() {
        let renderer = ChromiumRenderer::launch(&BrowserOptions::default())
            .await
            .expect("failed to launch renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<div class='c'>a<br>Ethereum</div><div class='c'>42</div>",
            10000,
        )
        .await
        .expect("navigation failed");

        let cells = ctx.query_text("div.c").await.expect("query failed");
        assert_eq!(cells, vec!["a\nEthereum".to_string(), "42".to_string()]);

        let extent = ctx
            .execute_js("window.innerHeight + window.scrollY")
            .await
            .expect("JS execution failed");
        assert!(extent.as_f64().is_some());

        let scrolled = ctx
            .execute_js("window.scrollBy(0, window.innerHeight)")
            .await
            .expect("scroll failed");
        assert!(scrolled.is_null());

        ctx.close().await.expect("close failed");
        renderer.shutdown().await.expect("shutdown failed");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(renderer.handler.is_finished());

        // Shutting down twice leaves the handler stopped.
        let _ = renderer.shutdown().await;
        assert!(renderer.handler.is_finished());
    }
}

//! Cycle scheduler: navigate, extract, save, reset, sleep, repeat.
//!
//! The browser page is acquired once for the whole run and released in
//! exactly one place, [`Scraper::run`], whichever way the run ends.

use crate::config::ScraperConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{ExtractionLoop, Harvest};
use crate::output;
use crate::renderer::{RenderContext, Renderer};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How long a run lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle, then stop.
    Once,
    /// Cycle until a fault.
    Forever,
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub path: PathBuf,
    pub rows: usize,
    pub scrolls: u32,
    pub elapsed: Duration,
}

/// Owns the per-run configuration and the per-cycle row state.
pub struct Scraper {
    config: ScraperConfig,
    extraction: ExtractionLoop,
    harvest: Harvest,
}

impl Scraper {
    pub fn new(config: ScraperConfig) -> Self {
        let extraction = ExtractionLoop::new(config.cell_selector.clone(), config.row_shape)
            .with_scroll_settle(config.scroll_settle)
            .with_max_scrolls(config.max_scrolls);
        Self {
            config,
            extraction,
            harvest: Harvest::new(),
        }
    }

    /// Acquire a page from `renderer`, run cycles per `mode`, and release
    /// the page and the browser before returning.
    pub async fn run(&mut self, renderer: &dyn Renderer, mode: RunMode) -> ScrapeResult<()> {
        let result = match renderer.new_context().await {
            Ok(mut ctx) => {
                let result = match mode {
                    RunMode::Once => self.run_cycle(ctx.as_mut()).await.map(|_| ()),
                    RunMode::Forever => self.run_forever(ctx.as_mut()).await,
                };
                if let Err(e) = ctx.close().await {
                    warn!("error closing page: {e:#}");
                }
                result
            }
            Err(e) => Err(ScrapeError::BrowserLaunch(format!("{e:#}"))),
        };

        if let Err(e) = &result {
            error!(kind = e.kind(), "scraping stopped: {e}");
        }
        if let Err(e) = renderer.shutdown().await {
            warn!("error shutting down browser: {e:#}");
        }

        result
    }

    async fn run_forever(&mut self, ctx: &mut dyn RenderContext) -> ScrapeResult<()> {
        loop {
            self.run_cycle(ctx).await?;
            info!(
                "waiting {} minutes before next cycle",
                self.config.interval_mins()
            );
            tokio::time::sleep(self.config.cycle_interval).await;
        }
    }

    /// Load the target page and give client-side rendering time to finish.
    pub async fn load_page(&self, ctx: &mut dyn RenderContext) -> ScrapeResult<()> {
        let url = self.config.target_url.as_str();
        let timeout_ms = self.config.nav_timeout.as_millis() as u64;
        let nav = ctx
            .navigate(url, timeout_ms)
            .await
            .map_err(|e| ScrapeError::PageLoad(format!("{url}: {e:#}")))?;
        info!(
            load_time_ms = nav.load_time_ms,
            "loaded {}", nav.final_url
        );

        if !self.config.page_settle.is_zero() {
            tokio::time::sleep(self.config.page_settle).await;
        }
        Ok(())
    }

    /// Run one full cycle and write its rows to a freshly stamped file.
    pub async fn run_cycle(&mut self, ctx: &mut dyn RenderContext) -> ScrapeResult<CycleReport> {
        info!("starting new scraping cycle");
        let started = Instant::now();
        self.harvest.clear();

        self.load_page(ctx).await?;
        let scrolls = self.extraction.run(ctx, &mut self.harvest).await?;

        let path = output::cycle_path(&self.config.output_dir, &chrono::Local::now());
        info!("saving data to CSV: {}", path.display());
        output::write_rows(&path, self.harvest.rows())?;
        let rows = self.harvest.len();
        info!(rows, scrolls, "data successfully saved to {}", path.display());

        self.harvest.clear();
        let elapsed = started.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            "scraping cycle completed successfully"
        );

        Ok(CycleReport {
            path,
            rows,
            scrolls,
            elapsed,
        })
    }
}

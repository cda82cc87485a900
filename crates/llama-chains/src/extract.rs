//! Scroll-driven row extraction.
//!
//! The chains table renders lazily: only rows near the viewport exist in the
//! DOM. The extraction loop reads every rendered cell, folds complete
//! records into rows, scrolls one viewport down and repeats until the
//! scroll extent stops growing.

use crate::error::{ScrapeError, ScrapeResult};
use crate::renderer::RenderContext;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Script returning the revealed height of the page.
pub const SCROLL_EXTENT_JS: &str = "window.innerHeight + window.scrollY";

/// Script scrolling the page down by one viewport.
pub const SCROLL_BY_VIEWPORT_JS: &str = "window.scrollBy(0, window.innerHeight)";

/// One chain entry, kept exactly as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Row {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Protocols")]
    pub protocols: String,
    #[serde(rename = "TVL")]
    pub tvl: String,
}

impl Row {
    pub fn new(
        name: impl Into<String>,
        protocols: impl Into<String>,
        tvl: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocols: protocols.into(),
            tvl: tvl.into(),
        }
    }
}

/// Layout of the rendered cell stream: how many cells make one record, how
/// many leading records are decoration, and where each field sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShape {
    width: usize,
    skip_records: usize,
    name: usize,
    protocols: usize,
    tvl: usize,
}

impl Default for RowShape {
    fn default() -> Self {
        Self {
            width: 14,
            skip_records: 1,
            name: 0,
            protocols: 1,
            tvl: 6,
        }
    }
}

impl RowShape {
    /// Build a shape, rejecting offsets that fall outside a record.
    pub fn new(
        width: usize,
        skip_records: usize,
        name: usize,
        protocols: usize,
        tvl: usize,
    ) -> ScrapeResult<Self> {
        if width == 0 {
            return Err(ScrapeError::Config("record width must be at least 1".into()));
        }
        for (field, offset) in [("name", name), ("protocols", protocols), ("tvl", tvl)] {
            if offset >= width {
                return Err(ScrapeError::Config(format!(
                    "{field} offset {offset} is outside a {width}-cell record"
                )));
            }
        }
        Ok(Self {
            width,
            skip_records,
            name,
            protocols,
            tvl,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn skip_records(&self) -> usize {
        self.skip_records
    }

    /// Build a row from one complete record.
    ///
    /// The name cell may carry a logo caption or rank above the chain name;
    /// only its last line is kept.
    pub fn row_from_record(&self, record: &[String]) -> Row {
        let name_cell = record[self.name].as_str();
        let name = name_cell.rsplit('\n').next().unwrap_or(name_cell);
        Row::new(
            name,
            record[self.protocols].as_str(),
            record[self.tvl].as_str(),
        )
    }

    /// Rows for every complete data record in `cells`.
    ///
    /// A trailing partial record is ignored; it is picked up in full once
    /// the rest of its cells render.
    pub fn rows<'a>(&'a self, cells: &'a [String]) -> impl Iterator<Item = Row> + 'a {
        cells
            .chunks_exact(self.width)
            .skip(self.skip_records)
            .map(|record| self.row_from_record(record))
    }
}

/// Rows collected during one cycle, unique and in first-seen order.
#[derive(Debug, Default)]
pub struct Harvest {
    seen: HashSet<Row>,
    rows: Vec<Row>,
}

impl Harvest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows not seen before. Returns how many were new.
    pub fn absorb(&mut self, rows: impl IntoIterator<Item = Row>) -> usize {
        let before = self.rows.len();
        for row in rows {
            if self.seen.insert(row.clone()) {
                self.rows.push(row);
            }
        }
        self.rows.len() - before
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Forget everything; the next cycle starts from scratch.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.rows.clear();
    }
}

/// The scroll/read loop over one loaded page.
#[derive(Debug, Clone)]
pub struct ExtractionLoop {
    selector: String,
    shape: RowShape,
    scroll_settle: Duration,
    max_scrolls: Option<u32>,
}

impl ExtractionLoop {
    pub fn new(selector: impl Into<String>, shape: RowShape) -> Self {
        Self {
            selector: selector.into(),
            shape,
            scroll_settle: Duration::ZERO,
            max_scrolls: None,
        }
    }

    /// Wait this long after every scroll before measuring the page again.
    pub fn with_scroll_settle(mut self, settle: Duration) -> Self {
        self.scroll_settle = settle;
        self
    }

    /// Stop after this many scroll commands even if the page keeps growing.
    pub fn with_max_scrolls(mut self, max_scrolls: Option<u32>) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }

    /// Harvest rows from `ctx` until scrolling no longer reveals anything.
    ///
    /// Returns the number of scroll commands issued. Any browser fault
    /// aborts the loop; rows gathered so far stay in `harvest` but are not
    /// meant to be saved.
    pub async fn run(&self, ctx: &dyn RenderContext, harvest: &mut Harvest) -> ScrapeResult<u32> {
        let mut last_extent = scroll_extent(ctx).await?;
        let mut scrolls = 0u32;

        loop {
            let cells = ctx
                .query_text(&self.selector)
                .await
                .map_err(|e| ScrapeError::ElementQuery(format!("{e:#}")))?;
            let fresh = harvest.absorb(self.shape.rows(&cells));
            debug!(
                cells = cells.len(),
                fresh,
                total = harvest.len(),
                "scanned rendered records"
            );

            if let Some(max) = self.max_scrolls {
                if scrolls >= max {
                    warn!("stopping after {max} scrolls while page was still growing");
                    break;
                }
            }

            ctx.execute_js(SCROLL_BY_VIEWPORT_JS)
                .await
                .map_err(|e| ScrapeError::Automation(format!("scroll failed: {e:#}")))?;
            scrolls += 1;

            if !self.scroll_settle.is_zero() {
                tokio::time::sleep(self.scroll_settle).await;
            }

            let extent = scroll_extent(ctx).await?;
            if extent == last_extent {
                break;
            }
            last_extent = extent;
        }

        Ok(scrolls)
    }
}

async fn scroll_extent(ctx: &dyn RenderContext) -> ScrapeResult<f64> {
    let value = ctx
        .execute_js(SCROLL_EXTENT_JS)
        .await
        .map_err(|e| ScrapeError::Automation(format!("reading scroll extent failed: {e:#}")))?;
    value
        .as_f64()
        .ok_or_else(|| ScrapeError::Automation(format!("scroll extent is not a number: {value}")))
}

// Copyright 2026 llama-chains Contributors
// SPDX-License-Identifier: Apache-2.0

//! llama-chains — periodic scraper for the DefiLlama chains table.
//!
//! A headless Chromium loads the chains page, the extraction loop scrolls
//! it one viewport at a time collecting unique rows, and each cycle's rows
//! land in a timestamped CSV file.

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod output;
pub mod renderer;
pub mod scheduler;
pub mod stealth;

pub use config::ScraperConfig;
pub use error::{ScrapeError, ScrapeResult};
pub use extract::{ExtractionLoop, Harvest, Row, RowShape};
pub use scheduler::{CycleReport, RunMode, Scraper};

//! Error taxonomy for a scraping run.

use std::path::PathBuf;

/// All faults that can stop a scraping run.
///
/// None of these are retried: the scheduler logs the fault, closes the
/// browser session and hands the error back to the caller.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Page load failed: {0}")]
    PageLoad(String),

    #[error("Element query failed: {0}")]
    ElementQuery(String),

    #[error("Automation error: {0}")]
    Automation(String),

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ScrapeError {
    /// Short label for the fault category, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Config(_) => "config",
            ScrapeError::BrowserLaunch(_) => "browser_launch",
            ScrapeError::PageLoad(_) => "page_load",
            ScrapeError::ElementQuery(_) => "element_query",
            ScrapeError::Automation(_) => "automation",
            ScrapeError::FileWrite { .. } => "file_write",
            ScrapeError::FileRead { .. } => "file_read",
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

//! Configuration loading and resolution.
//!
//! Everything is read once at startup from the process environment (after
//! loading `.env` if present). Numeric values that fail to parse fall back
//! to their defaults; a bad URL or row shape is an error.

use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::RowShape;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TARGET_URL: &str = "https://defillama.com/chains";
pub const DEFAULT_CELL_SELECTOR: &str = "div.sc-af4250f5-0.fYBVwr";
pub const DEFAULT_DELAY_MINS: u64 = 5;
pub const DEFAULT_PAGE_SETTLE_SECS: u64 = 5;
pub const DEFAULT_SCROLL_SETTLE_MS: u64 = 500;
pub const DEFAULT_NAV_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_FILE: &str = "scraping.log";
pub const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;

/// How the browser is launched.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Outbound proxy, passed to Chromium as `--proxy-server`.
    pub proxy: Option<String>,
    /// Explicit browser binary; searched for when unset.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            chromium_path: None,
            headless: true,
        }
    }
}

/// Where and how the log file is written.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub path: PathBuf,
    /// Rotate once the file reaches this size.
    pub max_bytes: u64,
    /// Write the file as JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_FILE),
            max_bytes: DEFAULT_LOG_MAX_BYTES,
            json: false,
        }
    }
}

impl LogOptions {
    /// Read only the log settings, so logging can start before the rest of
    /// the configuration is validated.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader(lookup);
        Self {
            path: env
                .string("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            max_bytes: env.u64("LOG_MAX_BYTES", DEFAULT_LOG_MAX_BYTES).max(1),
            json: env.bool("LOG_JSON", false),
        }
    }
}

/// Full configuration of a scraping run.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub target_url: Url,
    pub cell_selector: String,
    pub row_shape: RowShape,
    /// Idle time between the end of one cycle and the start of the next.
    pub cycle_interval: Duration,
    /// Wait after navigation so client-side rendering can finish.
    pub page_settle: Duration,
    /// Wait after each scroll before measuring the page again.
    pub scroll_settle: Duration,
    pub nav_timeout: Duration,
    pub max_scrolls: Option<u32>,
    pub output_dir: PathBuf,
    pub browser: BrowserOptions,
    pub log: LogOptions,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            target_url: Url::parse(DEFAULT_TARGET_URL).expect("default target URL is valid"),
            cell_selector: DEFAULT_CELL_SELECTOR.to_string(),
            row_shape: RowShape::default(),
            cycle_interval: minutes(DEFAULT_DELAY_MINS),
            page_settle: Duration::from_secs(DEFAULT_PAGE_SETTLE_SECS),
            scroll_settle: Duration::from_millis(DEFAULT_SCROLL_SETTLE_MS),
            nav_timeout: Duration::from_secs(DEFAULT_NAV_TIMEOUT_SECS),
            max_scrolls: None,
            output_dir: PathBuf::from("."),
            browser: BrowserOptions::default(),
            log: LogOptions::default(),
        }
    }
}

impl ScraperConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> ScrapeResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ScrapeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader(lookup);
        let defaults = RowShape::default();

        let target_url = match env.string("TARGET_URL") {
            Some(raw) => parse_target_url(&raw)?,
            None => Url::parse(DEFAULT_TARGET_URL).map_err(|e| ScrapeError::Config(e.to_string()))?,
        };

        let row_shape = RowShape::new(
            env.usize("RECORD_WIDTH", defaults.width()),
            env.usize("SKIP_RECORDS", defaults.skip_records()),
            env.usize("NAME_OFFSET", 0),
            env.usize("PROTOCOLS_OFFSET", 1),
            env.usize("TVL_OFFSET", 6),
        )?;

        Ok(Self {
            target_url,
            cell_selector: env
                .string("CELL_SELECTOR")
                .unwrap_or_else(|| DEFAULT_CELL_SELECTOR.to_string()),
            row_shape,
            cycle_interval: minutes(env.u64("DELAY_MINS", DEFAULT_DELAY_MINS)),
            page_settle: Duration::from_secs(env.u64("PAGE_SETTLE_SECS", DEFAULT_PAGE_SETTLE_SECS)),
            scroll_settle: Duration::from_millis(
                env.u64("SCROLL_SETTLE_MS", DEFAULT_SCROLL_SETTLE_MS),
            ),
            nav_timeout: Duration::from_secs(
                env.u64("NAV_TIMEOUT_SECS", DEFAULT_NAV_TIMEOUT_SECS).max(1),
            ),
            max_scrolls: env.string("MAX_SCROLLS").and_then(|v| v.parse().ok()),
            output_dir: env
                .string("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            browser: BrowserOptions {
                proxy: env.string("PROXY_SERVER"),
                chromium_path: env.string("CHROMIUM_PATH").map(PathBuf::from),
                headless: env.bool("HEADLESS", true),
            },
            log: LogOptions::from_lookup(&env.0),
        })
    }

    /// Cycle interval in whole minutes, for log lines.
    pub fn interval_mins(&self) -> u64 {
        self.cycle_interval.as_secs() / 60
    }
}

/// `mins` minutes as a duration, saturating instead of overflowing.
pub fn minutes(mins: u64) -> Duration {
    Duration::from_secs(mins.saturating_mul(60))
}

/// Parse and check a scrape target.
pub fn parse_target_url(raw: &str) -> ScrapeResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ScrapeError::Config(format!("invalid target URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" | "file" | "data" => Ok(url),
        other => Err(ScrapeError::Config(format!(
            "unsupported target URL scheme {other:?}"
        ))),
    }
}

struct EnvReader<F>(F);

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, default_value: u64) -> u64 {
        self.string(name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default_value)
    }

    fn usize(&self, name: &str, default_value: usize) -> usize {
        self.string(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default_value)
    }

    fn bool(&self, name: &str, default_value: bool) -> bool {
        match self.string(name).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ScrapeResult<ScraperConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScraperConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.target_url.as_str(), DEFAULT_TARGET_URL);
        assert_eq!(cfg.cycle_interval, Duration::from_secs(300));
        assert_eq!(cfg.interval_mins(), 5);
        assert_eq!(cfg.page_settle, Duration::from_secs(5));
        assert_eq!(cfg.row_shape, RowShape::default());
        assert!(cfg.browser.proxy.is_none());
        assert!(cfg.browser.headless);
        assert_eq!(cfg.log.path, PathBuf::from("scraping.log"));
        assert_eq!(cfg.log.max_bytes, 1024 * 1024);
        assert!(cfg.max_scrolls.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let cfg = config_from(&[
            ("DELAY_MINS", "15"),
            ("PROXY_SERVER", " socks5://127.0.0.1:9050 "),
            ("OUTPUT_DIR", "/var/lib/chains"),
            ("HEADLESS", "false"),
            ("MAX_SCROLLS", "40"),
            ("LOG_JSON", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.interval_mins(), 15);
        assert_eq!(cfg.browser.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        assert_eq!(cfg.output_dir, PathBuf::from("/var/lib/chains"));
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.max_scrolls, Some(40));
        assert!(cfg.log.json);
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let cfg = config_from(&[("DELAY_MINS", "soon"), ("SCROLL_SETTLE_MS", "-3")]).unwrap();
        assert_eq!(cfg.interval_mins(), DEFAULT_DELAY_MINS);
        assert_eq!(cfg.scroll_settle, Duration::from_millis(DEFAULT_SCROLL_SETTLE_MS));
    }

    #[test]
    fn test_empty_proxy_is_unset() {
        let cfg = config_from(&[("PROXY_SERVER", "   ")]).unwrap();
        assert!(cfg.browser.proxy.is_none());
    }

    #[test]
    fn test_row_shape_from_env() {
        let cfg = config_from(&[("RECORD_WIDTH", "8"), ("TVL_OFFSET", "5")]).unwrap();
        assert_eq!(cfg.row_shape, RowShape::new(8, 1, 0, 1, 5).unwrap());

        let err = config_from(&[("RECORD_WIDTH", "4")]).unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn test_bad_target_url() {
        assert!(config_from(&[("TARGET_URL", "not a url")]).is_err());
        assert!(config_from(&[("TARGET_URL", "ftp://example.com")]).is_err());
        let cfg = config_from(&[("TARGET_URL", "https://example.com/chains")]).unwrap();
        assert_eq!(cfg.target_url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_huge_delay_saturates() {
        let huge = u64::MAX.to_string();
        let cfg = config_from(&[("DELAY_MINS", huge.as_str())]).unwrap();
        assert_eq!(cfg.cycle_interval, Duration::from_secs(u64::MAX));
        assert_eq!(minutes(2), Duration::from_secs(120));
    }

    #[test]
    fn test_log_options_ignore_bad_scrape_settings() {
        let vars: HashMap<&str, &str> = [
            ("TARGET_URL", "ftp://example.com"),
            ("LOG_FILE", "/var/log/chains.log"),
            ("LOG_MAX_BYTES", "0"),
        ]
        .into_iter()
        .collect();
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());

        assert!(ScraperConfig::from_lookup(lookup).is_err());
        let log = LogOptions::from_lookup(lookup);
        assert_eq!(log.path, PathBuf::from("/var/log/chains.log"));
        assert_eq!(log.max_bytes, 1);
        assert!(!log.json);
    }
}

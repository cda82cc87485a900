// Copyright 2026 llama-chains Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing::{error, info};

use llama_chains::config::{minutes, parse_target_url, LogOptions, ScraperConfig};
use llama_chains::logging;
use llama_chains::renderer::chromium::ChromiumRenderer;
use llama_chains::{RunMode, ScrapeError, Scraper};

#[derive(Parser)]
#[command(
    name = "llama-chains",
    about = "Scrape the DefiLlama chains table into timestamped CSV files",
    version,
    after_help = "Settings are read from the environment (and .env); flags override them."
)]
struct Cli {
    /// Minutes to wait between cycles (env: DELAY_MINS)
    #[arg(long, value_name = "MINS")]
    interval_mins: Option<u64>,

    /// Page to scrape (env: TARGET_URL)
    #[arg(long)]
    url: Option<String>,

    /// Directory for cycle CSV files (env: OUTPUT_DIR)
    #[arg(long, short, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Outbound proxy, e.g. http://host:3128 (env: PROXY_SERVER)
    #[arg(long)]
    proxy: Option<String>,

    /// Chrome/Chromium binary (env: CHROMIUM_PATH)
    #[arg(long, value_name = "PATH")]
    chromium_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape forever, one cycle per interval (default)
    Run,
    /// Scrape a single cycle and exit
    Once,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

impl Cli {
    fn apply(&self, config: &mut ScraperConfig) -> Result<(), ScrapeError> {
        if let Some(mins) = self.interval_mins {
            config.cycle_interval = minutes(mins);
        }
        if let Some(url) = &self.url {
            config.target_url = parse_target_url(url)?;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.browser.proxy = Some(proxy.clone());
        }
        if let Some(path) = &self.chromium_path {
            config.browser.chromium_path = Some(path.clone());
        }
        if self.headful {
            config.browser.headless = false;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mode = match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "llama-chains", &mut std::io::stdout());
            return Ok(());
        }
        Some(Commands::Once) => RunMode::Once,
        Some(Commands::Run) | None => RunMode::Forever,
    };

    logging::init(&LogOptions::from_env(), cli.verbose)?;

    let config = match ScraperConfig::from_env().and_then(|mut config| {
        cli.apply(&mut config)?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            error!(kind = e.kind(), "invalid configuration: {e}");
            return Err(e.into());
        }
    };

    info!("starting llama-chains v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "target {} every {} minutes, writing to {}",
        config.target_url,
        config.interval_mins(),
        config.output_dir.display()
    );

    let renderer = match ChromiumRenderer::launch(&config.browser).await {
        Ok(renderer) => renderer,
        Err(e) => {
            error!("failed to launch browser: {e:#}");
            return Err(ScrapeError::BrowserLaunch(format!("{e:#}")).into());
        }
    };

    let mut scraper = Scraper::new(config);
    if let Err(e) = scraper.run(&renderer, mode).await {
        eprintln!("  Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

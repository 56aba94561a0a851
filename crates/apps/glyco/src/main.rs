//! Glyco - command line front end for the glucose sync engine
//!
//! Runs one refresh (or keeps refreshing with `--watch`) and prints the
//! annotated series.

use anyhow::{Context, Result};
use clap::Parser;
use glucose::{
    OfficialFeedAdapter, OfficialToken, RefreshOutcome, ShareCredentials, ShareFeedAdapter,
    SqliteReadingStore, SyncOptions, SyncOrchestrator, SyncSources,
};
use log::{error, info, warn};
use std::sync::Arc;

mod cli;
mod render;

use cli::Cli;

/// Reading cache filename in the Glyco config directory
const DB_FILE: &str = "readings.sqlite";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let mut options = SyncOptions::load().context("Failed to load sync.json")?;
    if let Some(hours) = cli.hours {
        options.window_hours = hours;
    }

    let orchestrator = Arc::new(build_orchestrator(&cli, options)?);

    let Some(every) = cli.watch else {
        let outcome = orchestrator.refresh(cli.force).await;
        print_outcome(&cli, &outcome);
        return Ok(());
    };

    info!("Refreshing every {}s, Ctrl-C to stop", every);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(every.max(1)));
    let mut force = cli.force;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = orchestrator.refresh(force).await;
                print_outcome(&cli, &outcome);
                // Only the first tick honours --force; the interval takes over after
                force = false;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                return Ok(());
            }
        }
    }
}

fn build_orchestrator(cli: &Cli, options: SyncOptions) -> Result<SyncOrchestrator> {
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config::config_path(DB_FILE).context("Could not determine config directory")?,
    };
    let store = SqliteReadingStore::new(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let mut sources = SyncSources::new(Arc::new(store));

    let timeout = options.adapter_timeout();

    // Load the official token from the config directory
    match OfficialToken::load() {
        Ok(Some(token)) => {
            let official =
                OfficialFeedAdapter::new(Some(token), options.official_delay_hours(), timeout);
            sources = sources.with_official(Arc::new(official));
        }
        Ok(None) => info!("No official token, skipping the official feed"),
        Err(e) => warn!("Failed to read official token: {:#}", e),
    }

    // Load share credentials from config file or environment
    match ShareCredentials::load() {
        Ok(credentials) => {
            sources = sources.with_share(Arc::new(ShareFeedAdapter::new(
                Some(credentials),
                timeout,
            )));
        }
        Err(e) => {
            warn!("Share credentials not found: {}", e);
            if let Some(path) = ShareCredentials::default_credentials_path() {
                warn!(
                    "To configure the share feed, either:\n\
                     1. Place your share login at: {}\n\
                     2. Or set environment variables: GLYCO_SHARE_USERNAME and GLYCO_SHARE_PASSWORD",
                    path.display()
                );
            }
        }
    }

    Ok(SyncOrchestrator::new(sources, options))
}

fn print_outcome(cli: &Cli, outcome: &RefreshOutcome) {
    println!("{}", render::summary(outcome));
    if cli.quiet {
        return;
    }
    if let Some(snapshot) = outcome.snapshot() {
        print!("{}", render::series(snapshot));
    }
}

//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

/// Glyco - print the reconciled glucose series
#[derive(Debug, Parser)]
#[command(name = "glyco", version, about)]
pub struct Cli {
    /// Bypass the minimum refresh interval
    #[arg(short, long)]
    pub force: bool,

    /// Length of the rolling window in hours (overrides sync.json)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=168))]
    pub hours: Option<u32>,

    /// Keep refreshing every SECS seconds until interrupted
    #[arg(short, long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Reading cache database (defaults to the config directory)
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

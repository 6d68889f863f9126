//! Fleet inventory CLI
//!
//! Walks every cluster of a container fleet and writes one instance report
//! and one task report per cluster.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fleet inventory CLI
#[derive(Parser)]
#[command(name = "fleet-inventory")]
#[command(author, version, about = "Per-cluster instance and task inventory reports", long_about = None)]
pub struct Cli {
    /// Fleet snapshot to inventory (JSON document)
    #[arg(long, env = "INVENTORY_SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Directory the reports are written to
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/fleet-inventory/config.toml)
    #[arg(long, env = "INVENTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identifiers per describe call (1-100)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Items per snapshot listing page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Write the run metrics in Prometheus text format to this file
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Summary format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Log format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so a JSON summary on stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    commands::inventory::run(&cli).await
}

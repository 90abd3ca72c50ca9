//! Durafix CLI - Command-line interface
//!
//! Provides command-line access to duration repair, bitrate estimation,
//! compression and the upload server.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use durafix_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "durafix")]
#[command(about = "Repair and compress browser-recorded WebM files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level
    #[arg(long, global = true, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the full debug log (disabled when omitted)
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}

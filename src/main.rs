//! TrimGrid CLI
//!
//! Mark segments of a video on a timeline and export them as clips with FFmpeg.
//!
//! # Usage
//!
//! ```bash
//! trimgrid timeline new grid.json --source match.mkv --duration 01:30:00
//! trimgrid timeline add grid.json --start 00:01:00 --end 00:01:30 --title kickoff
//! trimgrid batch --input match.mkv --timeline grid.json --out-dir clips --h265
//! trimgrid export --input match.mkv --start 00:10:00 --end 00:10:12.5
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trimgrid::adapters::toml_config::TomlConfigAdapter;
use trimgrid::cli::{commands, Cli};
use trimgrid::utils::logging::{init_logging, log_system_info};

/// Main entry point for the TrimGrid CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfigAdapter::load(cli.config.as_deref(), &cli.config_overrides())
        .context("Failed to load configuration")?;
    init_logging(config.log_level()?, config.log_json);
    log_system_info();
    debug!(?config, "Effective configuration");

    // Ctrl-C stops the running job and skips the rest of a batch
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling export");
            on_interrupt.cancel();
        }
    });

    commands::run(cli.command, &config, cancel).await?;

    info!("TrimGrid completed successfully");
    Ok(())
}

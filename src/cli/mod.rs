//! CLI module for TrimGrid
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::toml_config::ConfigOverrides;

pub mod args;
pub mod commands;

/// TrimGrid - cut named segments out of a video with FFmpeg
#[derive(Parser, Debug)]
#[command(name = "trimgrid")]
#[command(about = "Mark segments on a timeline and export them as clips")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./trimgrid.toml, then the user config dir)
    #[arg(long, global = true, env = "TRIMGRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Terminate a transcode job running longer than this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Command-line values that take precedence over env and file
    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            log_json: self.log_json.then_some(true),
            job_timeout_secs: self.timeout,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one range or one timeline segment
    Export(args::ExportArgs),
    /// Export several timeline segments, one after another
    Batch(args::BatchArgs),
    /// Edit or inspect a timeline document
    Timeline(args::TimelineArgs),
    /// Show duration and frame interval of a video
    Probe(args::ProbeArgs),
    /// Check that ffmpeg and ffprobe are available
    Doctor,
}

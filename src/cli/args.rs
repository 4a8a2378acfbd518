//! Command-line argument definitions

use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand};

use crate::domain::model::ExportPolicy;

/// Codec and rebasing switches shared by the export commands
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Re-encode video to H.265 instead of stream copy
    #[arg(long)]
    pub h265: bool,

    /// Use hardware decode (and the hardware encoder with --h265)
    #[arg(long)]
    pub hw: bool,

    /// Keep timeline times as authored even if the source duration differs
    #[arg(long)]
    pub no_rebase: bool,

    /// Print progress as JSON events on stdout
    #[arg(long)]
    pub json: bool,
}

impl PolicyArgs {
    /// Export policy, `scale_to_source` defaulting to the configured value
    pub fn policy(&self, scale_to_source: bool) -> ExportPolicy {
        ExportPolicy {
            use_hardware_decode: self.hw,
            encode_as_h265: self.h265,
            scale_to_source: scale_to_source && !self.no_rebase,
        }
    }
}

/// Arguments for the export command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("range").required(true).args(["start", "timeline"])))]
pub struct ExportArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Start time (HH:MM:SS.mmm, MM:SS.mmm, or seconds)
    #[arg(short, long, requires = "end", conflicts_with = "timeline")]
    pub start: Option<String>,

    /// End time (HH:MM:SS.mmm, MM:SS.mmm, or seconds)
    #[arg(short, long, requires = "start")]
    pub end: Option<String>,

    /// Timeline document to take the segment from
    #[arg(short, long, requires = "segment")]
    pub timeline: Option<PathBuf>,

    /// Segment number in the timeline (1-based, as shown by `timeline list`)
    #[arg(long, requires = "timeline")]
    pub segment: Option<usize>,

    /// Output file path (default: next to the input, named after the range)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Arguments for the batch command
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Timeline document
    #[arg(short, long)]
    pub timeline: PathBuf,

    /// Segment numbers to export, comma separated (1-based, default: all)
    #[arg(long, value_delimiter = ',')]
    pub indices: Option<Vec<usize>>,

    /// Directory receiving the clips
    #[arg(short, long)]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Arguments for the timeline command
#[derive(Args, Debug)]
pub struct TimelineArgs {
    #[command(subcommand)]
    pub action: TimelineAction,
}

/// Timeline document operations
#[derive(Subcommand, Debug)]
pub enum TimelineAction {
    /// Create an empty timeline document
    New {
        /// Document path
        file: PathBuf,

        /// Source video the segments refer to
        #[arg(long)]
        source: Option<PathBuf>,

        /// Duration of the source the segments are authored against
        #[arg(long)]
        duration: Option<String>,

        /// Replace an existing document
        #[arg(long)]
        force: bool,
    },
    /// Append a segment
    Add {
        file: PathBuf,

        #[arg(short, long)]
        start: String,

        #[arg(short, long)]
        end: String,

        #[arg(long, default_value = "")]
        title: String,
    },
    /// Remove a segment by number (1-based)
    Remove { file: PathBuf, number: usize },
    /// Remove all segments
    Clear { file: PathBuf },
    /// Show the segments
    List {
        file: PathBuf,

        /// Print the document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebase all segments onto a source of another duration
    Scale {
        file: PathBuf,

        /// New source duration
        #[arg(long)]
        duration: String,

        /// Write the result here instead of updating the document
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

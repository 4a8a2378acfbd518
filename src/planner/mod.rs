//! Transcode job planning module
//!
//! Turns a segment (or an ad-hoc range) plus an export policy into a fully
//! specified transcoder command. Nothing here touches the filesystem or
//! starts a process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod strategy;

pub use strategy::TranscodeJobPlanner;

/// Encoder identifiers and quality settings used when building commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Transcoder binary
    pub program: PathBuf,
    /// H.265 encoder used when hardware acceleration is requested
    pub hw_encoder: String,
    /// Value passed to `-hwaccel` for hardware decoding
    pub hw_decode_accel: String,
    /// Software H.265 encoder
    pub sw_encoder: String,
    /// Constant quality for the software encoder (0-51)
    pub crf: u8,
    /// Encoder preset
    pub preset: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            hw_encoder: "hevc_nvenc".to_string(),
            hw_decode_accel: "cuda".to_string(),
            sw_encoder: "libx265".to_string(),
            crf: 23,
            preset: "medium".to_string(),
        }
    }
}

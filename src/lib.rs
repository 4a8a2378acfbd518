//! TrimGrid Library
//!
//! Segment timelines for cutting clips out of a video, and the machinery to
//! export them through an external FFmpeg process: job planning, process
//! supervision with progress reporting and cancellation, and batch export.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod codec;
pub mod domain;
pub mod engine;
pub mod error;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{ExportCoordinator, ExportError, MarkingSession, Selection};
pub use codec::{LoadedTimeline, TimelineCodec, TimelineDocument};
pub use domain::errors::DomainError;
pub use domain::model::{
    BatchResult, ExportPolicy, JobId, ProgressEvent, ScalingContext, Segment, Timeline,
    TranscodeJobSpec, VideoCodecMode,
};
pub use engine::{ExecError, JobHandle, JobState, TranscodeExecutor};
pub use error::{TrimGridError, TrimGridResult};
pub use planner::{EncoderSettings, TranscodeJobPlanner};

//! Transcode execution engine
//!
//! Runs planned jobs as external transcoder processes and turns their
//! status output into progress events.

pub mod executor;
pub mod progress;

pub use executor::{ExecError, JobHandle, JobState, TranscodeExecutor};
pub use progress::{
    ChannelProgressCallback, ConsoleProgressCallback, JsonProgressCallback, NoOpProgressCallback,
    ProgressCallback, ProgressParser,
};

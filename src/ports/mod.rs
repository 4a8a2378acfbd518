// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::model::{JobId, TranscodeJobSpec};
use crate::engine::executor::ExecError;
use crate::error::TrimGridResult;

/// Capability interface of the media player used for preview and marking.
///
/// The core never decodes media itself; it only asks the player where it is
/// and tells it where to go.
pub trait PlaybackPort {
    /// Current playback position, `None` while nothing is loaded
    fn position_ms(&self) -> Option<i64>;

    /// Total media duration, `None` when the player does not know it yet
    fn duration_ms(&self) -> Option<u64>;

    fn seek(&mut self, position_ms: u64);

    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;
}

/// Port for running one planned transcode job to completion
#[async_trait]
pub trait TranscodePort: Send + Sync {
    /// Run `spec` and return the written output path.
    ///
    /// Triggering `cancel` terminates the job and yields `ExecError::Cancelled`.
    async fn transcode(
        &self,
        job_id: JobId,
        spec: &TranscodeJobSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ExecError>;
}

/// Port for media file probing
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Container duration in milliseconds
    async fn duration_ms(&self, path: &Path) -> TrimGridResult<u64>;

    /// Interval between video frames, `None` when the frame rate is unusable
    async fn frame_interval_ms(&self, path: &Path) -> TrimGridResult<Option<u64>>;
}

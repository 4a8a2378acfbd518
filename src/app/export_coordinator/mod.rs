// Export coordinator - Sequences transcode jobs for single and batch exports

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::{BatchResult, ExportPolicy, JobId, ScalingContext, Segment, Timeline};
use crate::domain::rules::{batch_clip_filename, claim_unique_filename, Marks};
use crate::engine::executor::ExecError;
use crate::planner::TranscodeJobPlanner;
use crate::ports::TranscodePort;

/// Errors of a single export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// What a single export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The timeline entry at this index
    Segment(usize),
    /// An ad-hoc range, typically taken from the current marks
    Range { start_ms: u64, end_ms: u64 },
}

impl Selection {
    /// Ad-hoc selection from in/out marks; a missing mark reads as 0
    pub fn from_marks(marks: &Marks) -> Self {
        Selection::Range {
            start_ms: marks.in_ms.unwrap_or(0),
            end_ms: marks.out_ms.unwrap_or(0),
        }
    }

    fn resolve(&self, timeline: &Timeline) -> Result<(u64, u64), DomainError> {
        let (start_ms, end_ms) = match *self {
            Selection::Segment(index) => {
                let segment = timeline.get(index)?;
                (segment.start_ms, segment.end_ms)
            }
            Selection::Range { start_ms, end_ms } => (start_ms, end_ms),
        };
        if end_ms <= start_ms {
            return Err(DomainError::InvalidRange { start_ms, end_ms });
        }
        Ok((start_ms, end_ms))
    }
}

/// Plans and runs exports, one job at a time
pub struct ExportCoordinator {
    planner: TranscodeJobPlanner,
    transcoder: Arc<dyn TranscodePort>,
    cancel: CancellationToken,
    next_job: AtomicU64,
}

impl ExportCoordinator {
    /// Create a coordinator with injected planner and transcoder
    pub fn new(planner: TranscodeJobPlanner, transcoder: Arc<dyn TranscodePort>) -> Self {
        Self {
            planner,
            transcoder,
            cancel: CancellationToken::new(),
            next_job: AtomicU64::new(1),
        }
    }

    /// Use an externally owned token for cancellation
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the running export when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the in-flight job and skip everything not started yet
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Export one segment or ad-hoc range to `output`
    pub async fn export_single(
        &self,
        timeline: &Timeline,
        selection: Selection,
        policy: &ExportPolicy,
        input: &Path,
        output: &Path,
    ) -> Result<PathBuf, ExportError> {
        let (start_ms, end_ms) = selection.resolve(timeline)?;
        let spec = self.planner.plan(input, start_ms, end_ms, output, policy)?;
        let job_id = self.next_job_id();

        info!(%job_id, start_ms, end_ms, "Exporting {}", output.display());
        let output = self.transcoder.transcode(job_id, &spec, &self.cancel).await?;
        Ok(output)
    }

    /// Export the segments at `indices`, in order, into `out_dir`.
    ///
    /// Jobs run strictly one after another. A failing job is recorded and the
    /// batch moves on; after cancellation the in-flight job is recorded as
    /// failed and the remaining ones as skipped. Finished outputs are kept.
    pub async fn export_batch(
        &self,
        timeline: &Timeline,
        indices: &[usize],
        policy: &ExportPolicy,
        input: &Path,
        out_dir: &Path,
        scaling: Option<ScalingContext>,
    ) -> BatchResult {
        let timeline = match scaling {
            Some(ctx) if policy.scale_to_source && ctx.is_effective() => {
                info!(
                    from_ms = ctx.reference_duration_ms,
                    to_ms = ctx.current_duration_ms,
                    "Rebasing segment times onto the opened source"
                );
                timeline.scale_to(ctx.current_duration_ms, ctx.reference_duration_ms)
            }
            _ => timeline.clone(),
        };

        let mut result = BatchResult::default();
        info!(jobs = indices.len(), out_dir = %out_dir.display(), "Starting batch export");

        let job_ids: Vec<JobId> = indices.iter().map(|_| self.next_job_id()).collect();

        if let Err(e) = std::fs::create_dir_all(out_dir) {
            warn!("Cannot create {}: {}", out_dir.display(), e);
            let reason = format!("cannot create output directory: {}", e);
            result.failed = job_ids.into_iter().map(|id| (id, reason.clone())).collect();
            return result;
        }

        let mut taken_names = HashSet::new();
        for (&index, job_id) in indices.iter().zip(job_ids) {
            if self.cancel.is_cancelled() {
                result.skipped.push(job_id);
                continue;
            }

            let segment = match timeline.get(index) {
                Ok(segment) => segment,
                Err(e) => {
                    warn!(%job_id, "Skipping entry {}: {}", index, e);
                    result.failed.push((job_id, e.to_string()));
                    continue;
                }
            };

            // Distinct titles can sanitize to the same name
            let name = claim_unique_filename(
                batch_clip_filename(input, segment, index),
                &mut taken_names,
            );
            match self.run_segment(job_id, segment, policy, input, &out_dir.join(name)).await {
                Ok(output) => result.succeeded.push(output),
                Err(e) => {
                    warn!(%job_id, "Batch entry {} failed: {}", index, e);
                    result.failed.push((job_id, e.to_string()));
                }
            }
        }

        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            "Batch export finished"
        );
        result
    }

    async fn run_segment(
        &self,
        job_id: JobId,
        segment: &Segment,
        policy: &ExportPolicy,
        input: &Path,
        output: &Path,
    ) -> Result<PathBuf, ExportError> {
        let spec = self.planner.plan_segment(input, segment, output, policy)?;
        Ok(self.transcoder.transcode(job_id, &spec, &self.cancel).await?)
    }

    fn next_job_id(&self) -> JobId {
        JobId(self.next_job.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests;

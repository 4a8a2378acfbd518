// Domain models - Segments, timelines and the export job vocabulary

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// A named time region of a source, destined to become one exported clip.
///
/// Segments are plain values: the timeline validates them on the way in and
/// replaces them wholesale, it never edits single fields in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    /// Free-form label, empty when the user did not name the segment
    #[serde(default)]
    pub title: String,
}

impl Segment {
    /// Create a segment without validating it; `Timeline::add` enforces the range
    pub fn new(start_ms: u64, end_ms: u64, title: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            title: title.into(),
        }
    }

    /// Create a segment, rejecting `end_ms <= start_ms`
    pub fn try_new(start_ms: u64, end_ms: u64, title: impl Into<String>) -> Result<Self, DomainError> {
        let segment = Self::new(start_ms, end_ms, title);
        segment.validate()?;
        Ok(segment)
    }

    /// Check the range invariant
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.end_ms <= self.start_ms {
            return Err(DomainError::InvalidRange {
                start_ms: self.start_ms,
                end_ms: self.end_ms,
            });
        }
        Ok(())
    }

    /// Length of the segment, never negative
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Pair of durations used to rebase segment times onto another copy of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingContext {
    /// Duration of the media currently opened
    pub current_duration_ms: u64,
    /// Duration the timeline was authored against
    pub reference_duration_ms: u64,
}

impl ScalingContext {
    pub fn new(current_duration_ms: u64, reference_duration_ms: u64) -> Self {
        Self {
            current_duration_ms,
            reference_duration_ms,
        }
    }

    /// Whether rebasing would change anything
    pub fn is_effective(&self) -> bool {
        self.reference_duration_ms > 0
            && self.current_duration_ms > 0
            && self.reference_duration_ms != self.current_duration_ms
    }

    /// Rebase a single segment; identical ratio returns it unchanged
    pub fn apply(&self, segment: &Segment) -> Segment {
        if !self.is_effective() {
            return segment.clone();
        }
        scale_segment(
            segment,
            self.current_duration_ms,
            self.reference_duration_ms,
        )
    }
}

/// Proportionally remap one segment, keeping it valid and inside `[0, new_duration_ms]`
fn scale_segment(segment: &Segment, new_duration_ms: u64, reference_duration_ms: u64) -> Segment {
    let ratio = new_duration_ms as f64 / reference_duration_ms as f64;

    // `as u64` saturates on overflow and maps NaN to zero
    let scaled_start = (segment.start_ms as f64 * ratio).round() as u64;
    let scaled_end = (segment.end_ms as f64 * ratio).round() as u64;

    let start_ms = scaled_start.min(new_duration_ms - 1);
    let mut end_ms = scaled_end.min(new_duration_ms);
    if end_ms <= start_ms {
        end_ms = new_duration_ms.min(start_ms + 1);
    }

    Segment {
        start_ms,
        end_ms,
        title: segment.title.clone(),
    }
}

/// Ordered collection of segments authored for one source ("grid").
///
/// Insertion order is display and export order; nothing is sorted implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    segments: Vec<Segment>,
    reference_duration_ms: Option<u64>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeline authored against a known source duration
    pub fn with_reference_duration(reference_duration_ms: u64) -> Self {
        Self {
            segments: Vec::new(),
            reference_duration_ms: Some(reference_duration_ms),
        }
    }

    /// Build a timeline from already-ordered segments, all-or-nothing
    pub fn from_segments(
        segments: Vec<Segment>,
        reference_duration_ms: Option<u64>,
    ) -> Result<Self, DomainError> {
        for segment in &segments {
            segment.validate()?;
        }
        Ok(Self {
            segments,
            reference_duration_ms,
        })
    }

    /// Append a segment and return its index
    pub fn add(&mut self, segment: Segment) -> Result<usize, DomainError> {
        segment.validate()?;
        self.segments.push(segment);
        Ok(self.segments.len() - 1)
    }

    /// Remove the segment at `index`, keeping the order of the rest
    pub fn remove(&mut self, index: usize) -> Result<Segment, DomainError> {
        self.check_index(index)?;
        Ok(self.segments.remove(index))
    }

    /// Replace the segment at `index` as a whole
    pub fn replace(&mut self, index: usize, segment: Segment) -> Result<Segment, DomainError> {
        self.check_index(index)?;
        segment.validate()?;
        Ok(std::mem::replace(&mut self.segments[index], segment))
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn get(&self, index: usize) -> Result<&Segment, DomainError> {
        self.segments.get(index).ok_or(DomainError::IndexOutOfRange {
            index,
            len: self.segments.len(),
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn reference_duration_ms(&self) -> Option<u64> {
        self.reference_duration_ms
    }

    /// Record the duration the segment times refer to (captured at save time)
    pub fn set_reference_duration_ms(&mut self, duration_ms: Option<u64>) {
        self.reference_duration_ms = duration_ms;
    }

    /// Rebase every segment from `reference_duration_ms` onto `new_duration_ms`.
    ///
    /// Start times are clamped into `[0, new - 1]`, end times into `[0, new]`,
    /// and a collapsed segment is widened to one millisecond, so every result
    /// stays valid even for extreme ratios. A zero reference, a zero target or
    /// an identical duration leaves the timeline as it is.
    pub fn scale_to(&self, new_duration_ms: u64, reference_duration_ms: u64) -> Timeline {
        let context = ScalingContext::new(new_duration_ms, reference_duration_ms);
        if !context.is_effective() {
            return self.clone();
        }

        Timeline {
            segments: self.segments.iter().map(|s| context.apply(s)).collect(),
            reference_duration_ms: Some(new_duration_ms),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), DomainError> {
        if index >= self.segments.len() {
            return Err(DomainError::IndexOutOfRange {
                index,
                len: self.segments.len(),
            });
        }
        Ok(())
    }
}

/// User-declared export options, supplied per export call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPolicy {
    pub use_hardware_decode: bool,
    pub encode_as_h265: bool,
    /// Rebase segment times when the opened media duration differs
    pub scale_to_source: bool,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            use_hardware_decode: false,
            encode_as_h265: false,
            scale_to_source: true,
        }
    }
}

/// How the video stream is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodecMode {
    /// Stream copy, no re-encode
    Copy,
    /// H.265 re-encode on the software or hardware encoder
    ReencodeH265 { hw: bool },
}

impl VideoCodecMode {
    /// Policy table: stream copy unless H.265 was asked for
    pub fn select(policy: &ExportPolicy) -> Self {
        if policy.encode_as_h265 {
            VideoCodecMode::ReencodeH265 {
                hw: policy.use_hardware_decode,
            }
        } else {
            VideoCodecMode::Copy
        }
    }
}

/// Fully specified transcoder invocation; nothing is executed by building it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJobSpec {
    /// Transcoder binary
    pub program: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub video_codec_mode: VideoCodecMode,
    pub hardware_decode: bool,
    /// Arguments passed to `program`, in order
    pub argv: Vec<String>,
}

/// Identifier of one job within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Progress report for a running job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub elapsed_seconds: f64,
    /// Completion in `[0, 100]`
    pub percent: u8,
}

/// Outcome of a batch export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(JobId, String)>,
    /// Jobs never started because the batch was cancelled
    pub skipped: Vec<JobId>,
}

impl BatchResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

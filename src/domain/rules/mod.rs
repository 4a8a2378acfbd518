// Domain rules - In/out marking and output naming policies

use std::collections::HashSet;
use std::path::Path;

use crate::domain::errors::DomainError;
use crate::domain::model::Segment;
use crate::utils::time::format_timestamp_for_filename;

/// Container extension used for every exported clip
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Frame interval assumed when the source frame rate is unknown (~25 fps)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 40;

/// In/out marks set against the playback position.
///
/// The marks always describe a usable range once both are present: setting
/// IN past OUT drops OUT, and OUT is pushed at least one millisecond past IN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Marks {
    pub in_ms: Option<u64>,
    pub out_ms: Option<u64>,
}

impl Marks {
    /// Place the IN mark, dropping an OUT mark that would now precede it
    pub fn set_in(&mut self, position_ms: u64) {
        if matches!(self.out_ms, Some(out) if position_ms >= out) {
            self.out_ms = None;
        }
        self.in_ms = Some(position_ms);
    }

    /// Place the OUT mark; a missing IN defaults to the start of the media
    pub fn set_out(&mut self, position_ms: u64) {
        let in_ms = *self.in_ms.get_or_insert(0);
        self.out_ms = Some(position_ms.max(in_ms + 1));
    }

    pub fn clear(&mut self) {
        self.in_ms = None;
        self.out_ms = None;
    }

    pub fn is_complete(&self) -> bool {
        matches!((self.in_ms, self.out_ms), (Some(i), Some(o)) if o > i)
    }

    /// Turn the marks into a segment
    pub fn to_segment(&self, title: impl Into<String>) -> Result<Segment, DomainError> {
        let start_ms = self.in_ms.unwrap_or(0);
        let end_ms = self.out_ms.unwrap_or(0);
        Segment::try_new(start_ms, end_ms, title)
    }
}

/// Target of a relative seek; stays inside `[0, duration - 1]` when the duration is known
pub fn clamp_seek(current_ms: u64, delta_ms: i64, duration_ms: Option<u64>) -> u64 {
    let target = if delta_ms.is_negative() {
        current_ms.saturating_sub(delta_ms.unsigned_abs())
    } else {
        current_ms.saturating_add(delta_ms as u64)
    };
    match duration_ms {
        Some(duration) if duration > 0 => target.min(duration - 1),
        _ => target,
    }
}

/// Frame interval in milliseconds for a probed frame rate, if the rate is plausible
pub fn frame_interval_ms(fps: f64) -> Option<u64> {
    if fps > 0.1 && fps < 1000.0 {
        Some(((1000.0 / fps).round() as u64).max(1))
    } else {
        None
    }
}

/// Keep titles usable as a filename component
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

/// Label of a segment in a batch: its title, or `segNN` from its 1-based position
pub fn segment_label(segment: &Segment, position: usize) -> String {
    let sanitized = sanitize_title(&segment.title);
    if sanitized.is_empty() {
        format!("seg{:02}", position + 1)
    } else {
        sanitized
    }
}

fn source_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "clip".to_string())
}

/// Default name for a single exported range: `{stem}_{start}_{end}.mp4`
pub fn clip_filename(input: &Path, start_ms: u64, end_ms: u64) -> String {
    format!(
        "{}_{}_{}.{}",
        source_stem(input),
        format_timestamp_for_filename(start_ms),
        format_timestamp_for_filename(end_ms),
        OUTPUT_EXTENSION
    )
}

/// Name for a batch entry: `{stem}_{label}_{start}_{end}.mp4`.
///
/// Both boundaries are always part of the name, so equally titled segments
/// only collide when their times are identical too.
pub fn batch_clip_filename(input: &Path, segment: &Segment, position: usize) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        source_stem(input),
        segment_label(segment, position),
        format_timestamp_for_filename(segment.start_ms),
        format_timestamp_for_filename(segment.end_ms),
        OUTPUT_EXTENSION
    )
}

/// Claim `name` within one batch, adding `_2`, `_3`, ... before the
/// extension while it is already taken.
pub fn claim_unique_filename(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
        None => (name.clone(), String::new()),
    };
    let mut counter = 2usize;
    loop {
        let candidate = format!("{}_{}{}", stem, counter, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

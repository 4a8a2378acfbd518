//! Timeline document codec
//!
//! A timeline is persisted as a JSON document:
//!
//! ```json
//! {
//!   "source_file": "/videos/match.mkv",
//!   "source_duration_ms": 5400000,
//!   "segments": [ { "start_ms": 1000, "end_ms": 3000, "title": "kick-off" } ]
//! }
//! ```
//!
//! Loading is all-or-nothing: the first bad field or segment rejects the whole
//! document, no partial timeline is ever produced.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::errors::DomainError;
use crate::domain::model::{Segment, Timeline};
use crate::error::TrimGridResult;

/// On-disk shape of a timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub source_file: Option<String>,
    pub source_duration_ms: u64,
    pub segments: Vec<Segment>,
}

/// Result of loading a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTimeline {
    pub timeline: Timeline,
    /// Duration the segments were authored against, 0 when unknown
    pub source_duration_ms: u64,
    pub source_file: Option<String>,
}

/// Serializer/deserializer for timeline documents
pub struct TimelineCodec;

impl TimelineCodec {
    /// Build the document for a timeline. An unknown reference duration is written as 0.
    pub fn to_document(timeline: &Timeline, source: Option<&Path>) -> TimelineDocument {
        TimelineDocument {
            source_file: source.map(|p| p.to_string_lossy().into_owned()),
            source_duration_ms: timeline.reference_duration_ms().unwrap_or(0),
            segments: timeline.segments().to_vec(),
        }
    }

    /// Serialize a timeline to pretty-printed JSON
    pub fn serialize(timeline: &Timeline, source: Option<&Path>) -> TrimGridResult<String> {
        let document = Self::to_document(timeline, source);
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Parse a JSON document into a timeline
    pub fn deserialize(text: &str) -> Result<LoadedTimeline, DomainError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DomainError::malformed(format!("invalid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// Validate and convert an already parsed document
    pub fn from_value(value: &Value) -> Result<LoadedTimeline, DomainError> {
        let root = value
            .as_object()
            .ok_or_else(|| DomainError::malformed("document root must be an object"))?;

        let source_file = match root.get("source_file") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(DomainError::malformed(format!(
                    "source_file must be a string or null, got {}",
                    other
                )))
            }
        };

        let source_duration_ms = match root.get("source_duration_ms") {
            None | Some(Value::Null) => {
                return Err(DomainError::malformed("missing source_duration_ms"))
            }
            Some(v) => as_millis(v).ok_or_else(|| {
                DomainError::malformed(format!(
                    "source_duration_ms is not a non-negative integer: {}",
                    v
                ))
            })?,
        };

        let entries = root
            .get("segments")
            .ok_or_else(|| DomainError::malformed("missing segments"))?
            .as_array()
            .ok_or_else(|| DomainError::malformed("segments must be an array"))?;

        let mut segments = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let object = entry
                .as_object()
                .ok_or_else(|| DomainError::malformed_segment(index, "not an object"))?;
            let segment = parse_segment(index, object)?;
            segment
                .validate()
                .map_err(|e| DomainError::malformed_segment(index, e.to_string()))?;
            segments.push(segment);
        }

        let reference = (source_duration_ms > 0).then_some(source_duration_ms);
        let timeline = Timeline::from_segments(segments, reference)?;
        debug!(
            segments = timeline.len(),
            source_duration_ms, "Timeline document parsed"
        );

        Ok(LoadedTimeline {
            timeline,
            source_duration_ms,
            source_file,
        })
    }

    /// Read a document from disk
    pub fn load(path: impl AsRef<Path>) -> TrimGridResult<LoadedTimeline> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let loaded = Self::deserialize(&text)?;
        info!(
            "Loaded timeline from {} ({} segments)",
            path.display(),
            loaded.timeline.len()
        );
        Ok(loaded)
    }

    /// Write a document to disk, creating parent directories
    pub fn save(
        timeline: &Timeline,
        source: Option<&Path>,
        path: impl AsRef<Path>,
    ) -> TrimGridResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::serialize(timeline, source)?)?;
        info!("Saved timeline to {} ({} segments)", path.display(), timeline.len());
        Ok(())
    }
}

fn parse_segment(index: usize, object: &Map<String, Value>) -> Result<Segment, DomainError> {
    let field = |name: &str| -> Result<u64, DomainError> {
        let value = object
            .get(name)
            .ok_or_else(|| DomainError::malformed_segment(index, format!("missing {}", name)))?;
        as_millis(value).ok_or_else(|| {
            DomainError::malformed_segment(
                index,
                format!("{} is not a non-negative integer: {}", name, value),
            )
        })
    };

    let start_ms = field("start_ms")?;
    let end_ms = field("end_ms")?;
    let title = match object.get("title") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(DomainError::malformed_segment(index, "title must be a string")),
    };

    Ok(Segment::new(start_ms, end_ms, title))
}

/// Integer-convertible, non-negative millisecond value.
///
/// Accepts JSON integers, floats without a fractional part and integer strings.
fn as_millis(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

// Domain errors - Error types for the timeline data model

use thiserror::Error;

/// Errors raised by the segment/timeline model and the timeline document codec.
///
/// All of them are returned synchronously and never leave a timeline partially
/// modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A segment or ad-hoc range has `end <= start`
    #[error("Invalid range: end ({end_ms} ms) must be greater than start ({start_ms} ms)")]
    InvalidRange { start_ms: u64, end_ms: u64 },

    /// Removal or selection referenced a timeline entry that does not exist
    #[error("Index {index} out of range for timeline with {len} segment(s)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A timeline document is missing fields or carries invalid values
    #[error("Malformed timeline document: {reason}")]
    MalformedDocument {
        reason: String,
        /// First offending segment, when the problem is inside `segments`
        segment_index: Option<usize>,
    },
}

impl DomainError {
    /// Build a `MalformedDocument` error that is not tied to a segment
    pub fn malformed(reason: impl Into<String>) -> Self {
        DomainError::MalformedDocument {
            reason: reason.into(),
            segment_index: None,
        }
    }

    /// Build a `MalformedDocument` error naming the offending segment index
    pub fn malformed_segment(index: usize, reason: impl Into<String>) -> Self {
        DomainError::MalformedDocument {
            reason: format!("segment {}: {}", index, reason.into()),
            segment_index: Some(index),
        }
    }
}

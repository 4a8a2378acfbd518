//! Error handling module for TrimGrid

use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::engine::executor::ExecError;

/// Main error type for TrimGrid operations
#[derive(Error, Debug)]
pub enum TrimGridError {
    /// Timeline model or document error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Transcoder process error
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.mmm, MM:SS.mmm, or seconds")]
    InvalidTimeFormat { time: String },

    /// Configuration file or value error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Media probe error
    #[error("Failed to probe media file: {message}")]
    ProbeError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Document serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for TrimGrid operations
pub type TrimGridResult<T> = std::result::Result<T, TrimGridError>;

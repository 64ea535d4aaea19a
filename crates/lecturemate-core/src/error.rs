//! Error types for video link and transcript handling.

use thiserror::Error;

/// Errors from the shared LectureMate helpers.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The link does not contain a recognizable video id.
    #[error("Video link could not be processed: {0}")]
    InvalidVideoLink(String),

    /// oEmbed lookup failed.
    #[error("Metadata lookup failed: {0}")]
    Metadata(String),

    /// Transcript file or payload could not be parsed.
    #[error("Invalid transcript: {0}")]
    TranscriptParse(String),

    /// Transcript has no text.
    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

//! Video transcripts.
//!
//! Caption segments arrive as `{text, start, duration}` records. The
//! summarizer works on one plain text, so segments are joined with single
//! spaces.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// One caption segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Start offset in seconds.
    #[serde(default)]
    pub start: f64,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,
}

/// A full transcript as plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    /// Wrap plain text; rejects empty or whitespace-only text.
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CoreError::EmptyTranscript);
        }
        Ok(Self { text })
    }

    /// Assemble caption segments in order.
    pub fn from_segments(segments: &[TranscriptSegment]) -> Result<Self> {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self::from_text(text)
    }

    /// Parse a JSON array of caption segments.
    pub fn from_json(json: &str) -> Result<Self> {
        let segments: Vec<TranscriptSegment> =
            serde_json::from_str(json).map_err(|e| CoreError::TranscriptParse(e.to_string()))?;
        Self::from_segments(&segments)
    }

    /// Load a transcript file.
    ///
    /// `.json` files are parsed as caption segments; anything else is read
    /// as plain text.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        debug!(path = %path.display(), bytes = content.len(), is_json, "Loading transcript");

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_text(content)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whitespace-separated word count.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

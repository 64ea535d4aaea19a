//! Video link parsing and metadata lookup.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{CoreError, Result};

/// Default oEmbed endpoint.
pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

// Accepts watch, short, embed, shorts, v/, vi/ and youtu.be links.
static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(?:(?:youtu\.be/|v/|vi/|u/\w/|embed/|shorts/)|(?:(?:watch)?\?vi?=|&vi?=))([^#&?]*).*")
        .expect("Invalid video id regex")
});

/// Extract the video id from a link.
pub fn parse_video_id(link: &str) -> Result<String> {
    let link = link.trim();
    VIDEO_ID_REGEX
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| CoreError::InvalidVideoLink(link.to_string()))
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Title and author of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(rename = "author_name")]
    pub author: String,
}

/// oEmbed metadata client.
#[derive(Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new(DEFAULT_OEMBED_ENDPOINT)
    }
}

impl MetadataClient {
    /// Create a client for the given oEmbed endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Look up title and author of a video.
    pub async fn fetch(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[("format", "json"), ("url", watch_url(video_id).as_str())],
        )
        .map_err(|e| CoreError::Metadata(format!("bad endpoint {}: {}", self.endpoint, e)))?;

        debug!(video_id, %url, "Fetching video metadata");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Metadata(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Metadata(format!("HTTP {} for video {}", status, video_id)));
        }

        let metadata: VideoMetadata = response
            .json()
            .await
            .map_err(|e| CoreError::Metadata(format!("unexpected response: {}", e)))?;

        info!(video_id, title = %metadata.title, author = %metadata.author, "Video metadata");
        Ok(metadata)
    }
}

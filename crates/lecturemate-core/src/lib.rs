//! LectureMate Core - shared helpers for the LectureMate front ends.
//!
//! - **config**: State directory layout and environment file loading
//! - **transcript**: Caption segments and plain-text transcripts
//! - **video**: Video link parsing and oEmbed metadata

pub mod config;
pub mod error;
pub mod transcript;
pub mod video;

// Re-export commonly used items for convenience
pub use config::{config_dir, env_file, load_env, load_env_file, output_dir, state_dir};
pub use error::{CoreError, Result};
pub use transcript::{Transcript, TranscriptSegment};
pub use video::{parse_video_id, watch_url, MetadataClient, VideoMetadata};

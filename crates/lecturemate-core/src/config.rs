//! Shared configuration paths for LectureMate.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.lecturemate/
//! ├── config/       # .env.local with API keys
//! └── output/       # Rendered summaries
//! ```
//!
//! # Environment Variables
//!
//! - `LECTUREMATE_STATE_DIR`: Override the base state directory
//! - `LECTUREMATE_OUTPUT_DIR`: Override the output directory

use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "LECTUREMATE_STATE_DIR";

/// Environment variable for custom output directory.
pub const OUTPUT_DIR_ENV: &str = "LECTUREMATE_OUTPUT_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".lecturemate";

// Subdirectory names
const CONFIG_SUBDIR: &str = "config";
const OUTPUT_SUBDIR: &str = "output";

/// Get the LectureMate state directory.
///
/// 1. `LECTUREMATE_STATE_DIR` if set
/// 2. `~/.lecturemate` if a home directory is available
/// 3. `.lecturemate` in the current directory
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Get the user config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// Get the output directory for rendered summaries.
///
/// Defaults to `~/.lecturemate/output/` or `LECTUREMATE_OUTPUT_DIR`.
pub fn output_dir() -> PathBuf {
    std::env::var(OUTPUT_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(OUTPUT_SUBDIR))
}

/// Get the .env.local file path.
///
/// Environment file for secrets (API keys).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Load environment files.
///
/// The config directory's `.env.local` is read first, then `.env.local` and
/// `.env` in the working directory. Variables already set are never
/// overwritten. Returns the files that were loaded.
pub fn load_env() -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for path in [env_file(), PathBuf::from(".env.local"), PathBuf::from(".env")] {
        if load_env_file(&path) {
            loaded.push(path);
        }
    }
    loaded
}

/// Load one environment file if it exists.
pub fn load_env_file(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment file");
            true
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping environment file");
            false
        }
    }
}

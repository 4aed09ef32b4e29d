//! Error types for the recipe build pipeline.
//!
//! Per-source failures are caught and recorded by the build orchestrator
//! while it advances to the next candidate source; only total exhaustion
//! surfaces, as [`BuildError::Exhausted`] carrying every per-source reason.

use thiserror::Error;

/// Type alias for Result using [`BuildError`].
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that can occur while reading sources and building the dataset.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A source file was absent or unreadable.
    #[error("Source I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A source body was not valid JSON.
    #[error("Malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A network-level failure while fetching a remote source.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote source answered with a non-success status.
    #[error("HTTP {status}")]
    Http {
        /// The status code returned by the source
        status: u16,
    },

    /// The source was readable but yielded no identifiable entries or
    /// recipes.
    #[error("No usable data: {0}")]
    Schema(String),

    /// Every configured recipe source failed or produced zero recipes.
    /// Carries the joined per-source reasons for diagnostics.
    #[error("No usable recipe source. {}", reasons.join(" | "))]
    Exhausted {
        /// One human-readable reason per exhausted source
        reasons: Vec<String>,
    },
}

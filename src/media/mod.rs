//! Media acquisition
//!
//! Extraction through `yt-dlp`, the preview-image scraping fallback and the
//! policy that picks between them.

mod error;

/// Output-path recovery for extraction runs.
pub mod destination;
/// Primary/fallback download policy.
pub mod orchestrator;
/// Reply-shape policy for finished downloads.
pub mod reply;
/// Extraction tool process runner.
pub mod runner;
/// Social preview image scraping fallback.
pub mod scrape;
/// Run-scoped file name tokens.
pub mod token;

pub use error::DownloadError;
pub use orchestrator::Orchestrator;
pub use runner::YtdlpRunner;
pub use scrape::PreviewScraper;
pub use token::RunToken;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What the user asked to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormatHint {
    /// Playable video (default for links without a prompt)
    #[default]
    Video,
    /// Audio track only
    Audio,
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// Classification of an acquired file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Video container
    Video,
    /// Audio-only file
    Audio,
    /// Still image
    Image,
    /// Anything else
    Document,
}

/// A single download invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Source page or media URL
    pub url: String,
    /// Requested representation
    pub format: FormatHint,
    /// Directory all produced files are written to
    pub work_dir: PathBuf,
}

impl DownloadRequest {
    /// Build a request for `url` in `work_dir`
    #[must_use]
    pub fn new(url: impl Into<String>, format: FormatHint, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            format,
            work_dir: work_dir.into(),
        }
    }
}

/// A file located on disk after a successful acquisition.
///
/// The caller owns the file and is responsible for removing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Location of the file
    pub file_path: PathBuf,
    /// File name, still carrying the run token prefix
    pub display_title: String,
    /// How the file should be presented
    pub media_kind: MediaKind,
    /// On-disk size at resolution time
    pub size_bytes: u64,
}

/// Anything that can turn a [`DownloadRequest`] into a file on disk
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Acquire the media described by `request`
    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError>;
}

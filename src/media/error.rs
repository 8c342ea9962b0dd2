use thiserror::Error;

/// Errors that can occur while acquiring media
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Extraction tool exited without a usable file
    #[error("yt-dlp exited with code {exit_code}. Stderr: {stderr}")]
    ExtractionFailed {
        /// Process exit code, `-1` when killed by a signal
        exit_code: i32,
        /// Filtered stderr excerpt
        stderr: String,
    },
    /// Extraction tool could not be started
    #[error("failed to launch {tool}: {source}")]
    ToolUnavailable {
        /// Command that was attempted
        tool: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },
    /// Extraction tool exceeded its deadline and was killed
    #[error("yt-dlp timed out after {limit:?}")]
    Timeout {
        /// Deadline that was exceeded
        limit: std::time::Duration,
    },
    /// Page carried neither preview image tag
    #[error("could not find og:image or twitter:image on page")]
    NoPreviewImageFound,
    /// Page or image request failed
    #[error("request failed: {0}")]
    FetchFailed(String),
    /// Reply to the format prompt was not a valid option
    #[error("invalid choice: {0:?}")]
    InvalidChoice(String),
    /// Requested format cannot be produced by this path
    #[error("audio download failed; scraping fallback not available for audio")]
    ConversionUnsupported,
    /// Filesystem error while writing or inspecting the result
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Both the extractor and the fallback failed
    #[error("Failed to download media. yt-dlp error: {primary}. Scraping error: {fallback}")]
    Combined {
        /// Extractor failure
        primary: Box<DownloadError>,
        /// Fallback failure
        fallback: Box<DownloadError>,
    },
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::FetchFailed(e.to_string())
    }
}

impl DownloadError {
    /// Text shown to the user for this failure
    #[must_use]
    pub fn user_message(&self) -> String {
        let raw = self.to_string();
        if raw.contains("deprecated") {
            return "Server update required (Python).".to_string();
        }

        // A combined failure is worded after the extractor's side
        let cause = match self {
            Self::Combined { primary, .. } => primary.as_ref(),
            other => other,
        };
        match cause {
            Self::ExtractionFailed { exit_code: 1, .. } => {
                "Content is private or unavailable.".to_string()
            }
            Self::Timeout { .. } => "The download took too long and was stopped.".to_string(),
            Self::ToolUnavailable { .. } => "Downloader is not available right now.".to_string(),
            _ => raw,
        }
    }
}

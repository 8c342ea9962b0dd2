use super::{DownloadError, DownloadRequest, DownloadResult, FormatHint, MediaSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Tries the extractor first and, for non-audio requests, the scraping
/// fallback second.
///
/// The extractor covers most platforms but fails outright on
/// link-preview-only pages; the fallback only ever yields one still image,
/// so it is never tried when audio was asked for.
#[derive(Clone)]
pub struct Orchestrator {
    primary: Arc<dyn MediaSource>,
    fallback: Arc<dyn MediaSource>,
}

impl Orchestrator {
    /// Compose a primary source with its fallback
    #[must_use]
    pub fn new(primary: Arc<dyn MediaSource>, fallback: Arc<dyn MediaSource>) -> Self {
        Self { primary, fallback }
    }

    /// Run the primary/fallback policy for one request.
    ///
    /// # Errors
    ///
    /// The primary error unchanged for audio requests, otherwise
    /// `Combined` when both paths fail.
    #[instrument(skip(self, request), fields(url = %request.url, format = %request.format))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let primary_err = match self.primary.fetch(request).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        info!(source = self.primary.name(), error = %primary_err, "Primary download failed");

        if request.format == FormatHint::Audio {
            return Err(primary_err);
        }

        info!(source = self.fallback.name(), "Attempting fallback");
        match self.fallback.fetch(request).await {
            Ok(result) => Ok(result),
            Err(fallback_err) => {
                warn!(error = %fallback_err, "Fallback download failed");
                Err(DownloadError::Combined {
                    primary: Box::new(primary_err),
                    fallback: Box::new(fallback_err),
                })
            }
        }
    }
}

#[async_trait]
impl MediaSource for Orchestrator {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        self.download(request).await
    }
}

//! Preview-image scraping fallback
//!
//! Link-preview-only pages (many social platforms) defeat the extractor but
//! still carry an `og:image` or `twitter:image` tag. This path downloads that
//! single image.

use super::{
    DownloadError, DownloadRequest, DownloadResult, FormatHint, MediaKind, MediaSource, RunToken,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Preview tags in order of preference
const PREVIEW_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
];

const DEFAULT_IMAGE_EXT: &str = ".jpg";
/// Longer "extensions" are query-string debris, not real ones
const MAX_EXT_LEN: usize = 5;

/// Find the preview image URL in a page
#[must_use]
pub fn extract_preview_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    PREVIEW_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(ToString::to_string)
    })
}

/// Extension (with dot) for a saved image, from its URL path
#[must_use]
pub fn image_extension(image_url: &str) -> String {
    let path = Url::parse(image_url).map_or_else(
        |_| image_url.split(['?', '#']).next().unwrap_or_default().to_string(),
        |u| u.path().to_string(),
    );

    let ext = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"));

    match ext {
        Some(ext) if ext.len() <= MAX_EXT_LEN => ext,
        _ => DEFAULT_IMAGE_EXT.to_string(),
    }
}

/// Scrapes a page's social preview image to disk
#[derive(Debug, Clone)]
pub struct PreviewScraper {
    client: Client,
}

impl PreviewScraper {
    /// Create a scraper with browser-like default headers
    ///
    /// # Errors
    ///
    /// Returns `FetchFailed` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch `page_url` and return the absolute preview image URL
    async fn find_image_url(&self, page_url: &str) -> Result<Url, DownloadError> {
        let response = self
            .client
            .get(page_url)
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().clone();
        let html = response.text().await?;

        let raw = extract_preview_image(&html).ok_or(DownloadError::NoPreviewImageFound)?;
        final_url
            .join(&raw)
            .map_err(|e| DownloadError::FetchFailed(format!("bad image url {raw:?}: {e}")))
    }

    /// Stream `image_url` into `path`, removing the file on failure
    async fn save_image(&self, image_url: Url, path: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get(image_url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(path).await?;
        let written = async {
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), DownloadError>(())
        }
        .await;
        drop(file);

        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Image write failed, removing partial file");
            if let Err(rm) = tokio::fs::remove_file(path).await {
                debug!(error = %rm, "Partial image already gone");
            }
            return Err(e);
        }

        Ok(tokio::fs::metadata(path).await?.len())
    }
}

#[async_trait]
impl MediaSource for PreviewScraper {
    fn name(&self) -> &'static str {
        "preview-scrape"
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        if request.format == FormatHint::Audio {
            return Err(DownloadError::ConversionUnsupported);
        }

        info!(url = %request.url, "Scraping page for preview image");
        let image_url = self.find_image_url(&request.url).await?;
        info!(image = %image_url, "Found preview image");

        let token = RunToken::next();
        let filename = format!(
            "{}image{}",
            token.file_prefix(),
            image_extension(image_url.as_str())
        );
        let file_path: PathBuf = request.work_dir.join(&filename);

        let size_bytes = self.save_image(image_url, &file_path).await?;

        Ok(DownloadResult {
            file_path,
            display_title: filename,
            media_kind: MediaKind::Image,
            size_bytes,
        })
    }
}

//! Inbound event routing
//!
//! Order per text message: a pending audio/video prompt is answered first,
//! then help commands, then the first link in the text. A new link from a
//! deferred platform sent while a prompt is open replaces that prompt.

use crate::conversation::{
    is_deferred_platform, parse_format_choice, ConversationId, PendingChoice, PendingChoiceStore,
};
use crate::convert::{is_pdf, DocumentConverter, DocumentFormat};
use crate::events::{InboundDocument, InboundEvent, Outbound, OutboundAction, OutboundMedia, Reaction};
use crate::media::reply::{clean_title, plan_reply, ReplyKind};
use crate::media::{DownloadError, DownloadRequest, FormatHint, MediaSource, RunToken};
use anyhow::{Context, Result};
use lazy_regex::regex_find;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const HELP_COMMANDS: &[&str] = &["!menu", "!ajuda", "!help", "/start", "/help"];

const HELP_TEXT: &str = "🤖 Atlas Bot - Help\n\n\
Here is what I can do for you:\n\n\
🎬 Download media\n\
Send links from YouTube, Instagram, TikTok, Pinterest, Twitter or Reddit to get videos or images.\n\n\
📄 Convert PDF to Word\n\
Just send a PDF file and I will turn it into a .docx for you.";

const FORMAT_PROMPT: &str = "🎞️ YouTube detected\n\n\
How do you want to download it?\n\n\
1️⃣ Audio\n\
2️⃣ Video\n\n\
Reply with 1 or 2";

const CANCELLED_TEXT: &str = "❌ Invalid option. Cancelled. Send the link again.";

/// First `http(s)://` link in `text`
#[must_use]
pub fn find_url(text: &str) -> Option<&str> {
    regex_find!(r"https?://\S+", text)
}

fn is_help_command(text: &str) -> bool {
    let text = text.trim();
    HELP_COMMANDS.iter().any(|c| text.eq_ignore_ascii_case(c))
}

/// Routes inbound events to downloads, prompts and conversions
pub struct MessageHandler {
    downloader: Arc<dyn MediaSource>,
    pending: Arc<dyn PendingChoiceStore>,
    converter: Arc<dyn DocumentConverter>,
    work_dir: PathBuf,
    inline_limit: u64,
}

impl MessageHandler {
    /// Create a handler writing its files under `work_dir`
    #[must_use]
    pub fn new(
        downloader: Arc<dyn MediaSource>,
        pending: Arc<dyn PendingChoiceStore>,
        converter: Arc<dyn DocumentConverter>,
        work_dir: impl Into<PathBuf>,
        inline_limit: u64,
    ) -> Self {
        Self {
            downloader,
            pending,
            converter,
            work_dir: work_dir.into(),
            inline_limit,
        }
    }

    /// Handle one inbound event to completion.
    ///
    /// Download and conversion failures are reported to the user and do not
    /// surface here.
    ///
    /// # Errors
    ///
    /// Returns an error only when the outbound transport fails.
    #[instrument(skip_all, fields(conversation = %event.conversation_id()))]
    pub async fn handle(&self, event: InboundEvent, out: &dyn Outbound) -> Result<()> {
        match event {
            InboundEvent::Text {
                conversation_id,
                text,
            } => self.handle_text(&conversation_id, &text, out).await,
            InboundEvent::Document { document, .. } => self.handle_document(document, out).await,
        }
    }

    async fn handle_text(&self, id: &ConversationId, text: &str, out: &dyn Outbound) -> Result<()> {
        if let Some(choice) = self.pending.take(id).await {
            return self.answer_prompt(choice, text, out).await;
        }

        if is_help_command(text) {
            return out.send(OutboundAction::ReplyText(HELP_TEXT.to_string())).await;
        }

        let Some(url) = find_url(text) else {
            debug!("No link in message");
            return Ok(());
        };

        if is_deferred_platform(url) {
            info!(url, "Deferred platform link, asking for format");
            return self.prompt_format(id.clone(), url, out).await;
        }

        info!(url, "Found URL, starting download");
        self.run_download(url, FormatHint::Video, out).await
    }

    /// Remember `url` for `id` (replacing any earlier link) and ask for the format
    async fn prompt_format(&self, id: ConversationId, url: &str, out: &dyn Outbound) -> Result<()> {
        self.pending
            .put(PendingChoice::awaiting_format(id, url))
            .await;
        out.send(OutboundAction::ReplyText(FORMAT_PROMPT.to_string()))
            .await
    }

    async fn answer_prompt(&self, choice: PendingChoice, reply: &str, out: &dyn Outbound) -> Result<()> {
        let Some(format) = parse_format_choice(reply) else {
            if let Some(url) = find_url(reply).filter(|u| is_deferred_platform(u)) {
                info!(url, previous = %choice.url, "Newer link replaces pending prompt");
                return self.prompt_format(choice.conversation_id, url, out).await;
            }

            let err = DownloadError::InvalidChoice(reply.trim().to_string());
            info!(error = %err, url = %choice.url, "Prompt cancelled");
            return out
                .send(OutboundAction::ReplyText(CANCELLED_TEXT.to_string()))
                .await;
        };

        let notice = match format {
            FormatHint::Audio => "🎵 Downloading audio... about 30s",
            FormatHint::Video => "📹 Downloading video... about 30s",
        };
        out.send(OutboundAction::ReplyText(notice.to_string())).await?;
        self.run_download(&choice.url, format, out).await
    }

    /// Download `url` and reply with the file, or with one error message
    async fn run_download(&self, url: &str, format: FormatHint, out: &dyn Outbound) -> Result<()> {
        react(out, Reaction::Working).await;

        let request = DownloadRequest::new(url, format, &self.work_dir);
        match self.deliver(&request, out).await {
            Ok(()) => {
                react(out, Reaction::Success).await;
                Ok(())
            }
            Err(e) => {
                warn!(url, error = ?e, "Download failed");
                let reason = e
                    .downcast_ref::<DownloadError>()
                    .map_or_else(|| e.to_string(), DownloadError::user_message);
                out.send(OutboundAction::ReplyText(format!(
                    "❌ Download failed\n\nReason: {reason}"
                )))
                .await?;
                react(out, Reaction::Failure).await;
                Ok(())
            }
        }
    }

    async fn deliver(&self, request: &DownloadRequest, out: &dyn Outbound) -> Result<()> {
        let result = self.downloader.fetch(request).await?;
        info!(
            path = %result.file_path.display(),
            kind = ?result.media_kind,
            size = result.size_bytes,
            "Sending file"
        );

        let plan = plan_reply(&result, request.format, self.inline_limit);
        let bytes = tokio::fs::read(&result.file_path)
            .await
            .with_context(|| format!("file not found after download: {}", result.file_path.display()))?;

        let sent = out
            .send(OutboundAction::ReplyMedia(OutboundMedia {
                kind: plan.kind,
                bytes,
                file_name: plan.file_name,
                mime_type: plan.mime_type,
                caption: plan.caption,
            }))
            .await;

        remove_quietly(&result.file_path).await;
        sent
    }

    async fn handle_document(&self, document: InboundDocument, out: &dyn Outbound) -> Result<()> {
        if !is_pdf(document.mime_type.as_deref()) {
            debug!(mime = ?document.mime_type, "Ignoring non-PDF document");
            return Ok(());
        }

        react(out, Reaction::Working).await;
        match self.convert_pdf(document, out).await {
            Ok(()) => {
                react(out, Reaction::Success).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = ?e, "Conversion failed");
                out.send(OutboundAction::ReplyText(format!("❌ Conversion failed: {e}")))
                    .await?;
                react(out, Reaction::Failure).await;
                Ok(())
            }
        }
    }

    async fn convert_pdf(&self, document: InboundDocument, out: &dyn Outbound) -> Result<()> {
        // Only the final component, sender-supplied names may contain separators
        let name = document
            .file_name
            .as_deref()
            .and_then(|n| Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("file.pdf");
        let input = self
            .work_dir
            .join(format!("{}{name}", RunToken::next().file_prefix()));

        tokio::fs::write(&input, &document.bytes)
            .await
            .with_context(|| format!("cannot store upload at {}", input.display()))?;

        let converted = self.converter.convert(&input, DocumentFormat::Docx).await;
        remove_quietly(&input).await;
        let output = converted?;

        let bytes = tokio::fs::read(&output).await?;
        let file_name = output
            .file_name()
            .map_or_else(|| "document.docx".to_string(), |n| clean_title(&n.to_string_lossy()));

        let sent = out
            .send(OutboundAction::ReplyMedia(OutboundMedia {
                kind: ReplyKind::Document,
                bytes,
                file_name,
                mime_type: DocumentFormat::Docx.mime_type().to_string(),
                caption: "📄 Here is your converted Word file!".to_string(),
            }))
            .await;

        remove_quietly(&output).await;
        sent
    }
}

/// Reactions are cosmetic, a failed one is only logged
async fn react(out: &dyn Outbound, reaction: Reaction) {
    if let Err(e) = out.send(OutboundAction::React(reaction)).await {
        debug!(?reaction, error = %e, "Failed to set reaction");
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "Could not remove file");
    }
}

//! Telegram message → [`InboundEvent`]

use crate::config::MAX_INBOUND_DOCUMENT_BYTES;
use crate::conversation::ConversationId;
use crate::convert::is_pdf;
use crate::events::{InboundDocument, InboundEvent};
use anyhow::Result;
use teloxide::net::Download;
use teloxide::prelude::*;
use tracing::{debug, info};

/// Sender's user id, or 0 for channel posts
#[must_use]
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Reduce `msg` to an event, downloading attached PDFs.
///
/// Other documents are never fetched; their caption, if any, is read as
/// text. Messages carrying neither text, caption nor PDF map to `None`.
///
/// # Errors
///
/// Returns an error if a PDF is too large or cannot be downloaded.
pub async fn extract_event(bot: &Bot, msg: &Message) -> Result<Option<InboundEvent>> {
    let conversation_id = ConversationId::from(msg.chat.id.0);

    let pdf = msg.document().filter(|doc| {
        let accepted = is_pdf(doc.mime_type.as_ref().map(|m| m.essence_str()));
        if !accepted {
            debug!(mime = ?doc.mime_type, "Skipping non-PDF document");
        }
        accepted
    });

    if let Some(doc) = pdf {
        if doc.file.size > MAX_INBOUND_DOCUMENT_BYTES {
            anyhow::bail!(
                "File too large: {:.1} MB (max 20 MB)",
                f64::from(doc.file.size) / 1024.0 / 1024.0
            );
        }

        let bytes = crate::utils::retry_telegram_operation(|| async {
            let file = bot.get_file(doc.file.id.clone()).await?;
            let mut buf = Vec::new();
            bot.download_file(&file.path, &mut buf).await?;
            Ok(buf)
        })
        .await?;

        info!(
            file_name = ?doc.file_name,
            size = bytes.len(),
            "Received document"
        );

        return Ok(Some(InboundEvent::Document {
            conversation_id,
            document: InboundDocument {
                file_name: doc.file_name.clone(),
                mime_type: doc.mime_type.as_ref().map(ToString::to_string),
                bytes,
            },
        }));
    }

    Ok(msg.text().or_else(|| msg.caption()).map(|text| InboundEvent::Text {
        conversation_id,
        text: text.to_string(),
    }))
}

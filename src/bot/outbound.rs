//! Telegram delivery of [`OutboundAction`]s.

use crate::events::{Outbound, OutboundAction, OutboundMedia, Reaction};
use crate::media::reply::ReplyKind;
use crate::utils::truncate_str;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ReactionType, ReplyParameters};
use tracing::warn;

/// Telegram caption limit
const MAX_CAPTION_CHARS: usize = 1024;
/// Telegram message limit
const MAX_TEXT_CHARS: usize = 4096;

/// Emoji set on the triggering message; must be from Telegram's allowed list
const fn reaction_emoji(reaction: Reaction) -> &'static str {
    match reaction {
        Reaction::Working => "👀",
        Reaction::Success => "👌",
        Reaction::Failure => "👎",
    }
}

/// Replies to one incoming Telegram message
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    chat_id: ChatId,
    reply_to: MessageId,
}

impl TelegramOutbound {
    /// Outbound bound to `msg`: everything is sent as a reply to it
    #[must_use]
    pub fn for_message(bot: Bot, msg: &Message) -> Self {
        Self {
            bot,
            chat_id: msg.chat.id,
            reply_to: msg.id,
        }
    }

    fn reply(&self) -> ReplyParameters {
        ReplyParameters::new(self.reply_to).allow_sending_without_reply()
    }

    async fn send_media(&self, media: OutboundMedia) -> Result<()> {
        let OutboundMedia {
            kind,
            bytes,
            file_name,
            caption,
            ..
        } = media;
        let caption = truncate_str(caption, MAX_CAPTION_CHARS);
        let make_file = || InputFile::memory(bytes.clone()).file_name(file_name.clone());

        let native = match kind {
            ReplyKind::Video => Some(
                self.bot
                    .send_video(self.chat_id, make_file())
                    .caption(caption.clone())
                    .reply_parameters(self.reply())
                    .await,
            ),
            ReplyKind::Image => Some(
                self.bot
                    .send_photo(self.chat_id, make_file())
                    .caption(caption.clone())
                    .reply_parameters(self.reply())
                    .await,
            ),
            ReplyKind::Audio => Some(
                self.bot
                    .send_audio(self.chat_id, make_file())
                    .caption(caption.clone())
                    .reply_parameters(self.reply())
                    .await,
            ),
            ReplyKind::Document => None,
        };

        match native {
            Some(Ok(_)) => return Ok(()),
            Some(Err(e)) => warn!(
                file_name = %file_name,
                error = %e,
                "Failed to send as native media; falling back to document"
            ),
            None => {}
        }

        self.bot
            .send_document(self.chat_id, make_file())
            .caption(caption)
            .reply_parameters(self.reply())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send(&self, action: OutboundAction) -> Result<()> {
        match action {
            OutboundAction::ReplyText(text) => {
                self.bot
                    .send_message(self.chat_id, truncate_str(text, MAX_TEXT_CHARS))
                    .reply_parameters(self.reply())
                    .await?;
            }
            OutboundAction::React(reaction) => {
                self.bot
                    .set_message_reaction(self.chat_id, self.reply_to)
                    .reaction(vec![ReactionType::Emoji {
                        emoji: reaction_emoji(reaction).to_string(),
                    }])
                    .await?;
            }
            OutboundAction::ReplyMedia(media) => self.send_media(media).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactions_are_distinct() {
        let all = [Reaction::Working, Reaction::Success, Reaction::Failure];
        let emoji: std::collections::HashSet<_> = all.iter().map(|r| reaction_emoji(*r)).collect();
        assert_eq!(emoji.len(), all.len());
    }
}

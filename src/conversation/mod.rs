//! Conversation state for deferred audio/video choices
//!
//! Links from a deferred-format platform are not downloaded right away: the
//! user is asked whether they want audio or video, and the next text they
//! send in that conversation is read as the answer.

mod store;

pub use store::{MokaPendingStore, PendingChoiceStore};

use crate::media::FormatHint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hosts whose links require an explicit audio/video choice
const DEFERRED_PLATFORM_PATTERNS: &[&str] = &["youtube.com", "youtu.be"];

/// Stable identifier of one conversation in the messaging system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a transport-specific identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Step a pending conversation is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceState {
    /// Prompt sent, waiting for "1"/"2"
    AwaitingFormat,
}

/// A link waiting for the user's audio/video answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    /// Conversation the prompt was sent to
    pub conversation_id: ConversationId,
    /// Link to download once answered
    pub url: String,
    /// Current step
    pub state: ChoiceState,
}

impl PendingChoice {
    /// New entry waiting for a format answer
    #[must_use]
    pub fn awaiting_format(conversation_id: ConversationId, url: impl Into<String>) -> Self {
        Self {
            conversation_id,
            url: url.into(),
            state: ChoiceState::AwaitingFormat,
        }
    }
}

/// Whether `url` belongs to a platform that needs the audio/video prompt
#[must_use]
pub fn is_deferred_platform(url: &str) -> bool {
    DEFERRED_PLATFORM_PATTERNS.iter().any(|p| url.contains(p))
}

/// Interpret a reply to the audio/video prompt.
///
/// `"1"` or `"audio"` selects audio, `"2"` or `"video"` selects video; the
/// words are case-insensitive and surrounding whitespace is ignored.
/// Anything else is `None` and cancels the prompt.
#[must_use]
pub fn parse_format_choice(reply: &str) -> Option<FormatHint> {
    let reply = reply.trim();
    if reply == "1" || reply.eq_ignore_ascii_case("audio") {
        Some(FormatHint::Audio)
    } else if reply == "2" || reply.eq_ignore_ascii_case("video") {
        Some(FormatHint::Video)
    } else {
        None
    }
}

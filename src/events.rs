//! Transport-agnostic message boundary.
//!
//! Inbound updates are reduced to a closed set of events; everything the
//! core wants to say goes out as an [`OutboundAction`].

use crate::conversation::ConversationId;
use crate::media::reply::ReplyKind;
use anyhow::Result;
use async_trait::async_trait;

/// A file attached to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDocument {
    /// Name given by the sender
    pub file_name: Option<String>,
    /// Declared MIME type
    pub mime_type: Option<String>,
    /// File content
    pub bytes: Vec<u8>,
}

/// Something a user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text (or a caption)
    Text {
        /// Sending conversation
        conversation_id: ConversationId,
        /// Message text
        text: String,
    },
    /// A document attachment
    Document {
        /// Sending conversation
        conversation_id: ConversationId,
        /// The attachment
        document: InboundDocument,
    },
}

impl InboundEvent {
    /// Conversation the event belongs to
    #[must_use]
    pub const fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::Text {
                conversation_id, ..
            }
            | Self::Document {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// Status reaction placed on the triggering message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Request accepted, work in progress
    Working,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failure,
}

/// A file sent back to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMedia {
    /// Representation
    pub kind: ReplyKind,
    /// File content
    pub bytes: Vec<u8>,
    /// Name shown to the user
    pub file_name: String,
    /// MIME type of the upload
    pub mime_type: String,
    /// Caption, may be empty
    pub caption: String,
}

/// One thing to do in the conversation, always as a reply to the
/// triggering message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Text reply
    ReplyText(String),
    /// Reaction on the triggering message
    React(Reaction),
    /// File reply
    ReplyMedia(OutboundMedia),
}

/// Sink for outbound actions of one inbound event
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Perform `action`
    async fn send(&self, action: OutboundAction) -> Result<()>;
}

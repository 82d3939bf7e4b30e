use super::InboundEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Kind of inbound message, decided once at normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image { mimetype: Option<String> },
    Video { mimetype: Option<String> },
    Document { file_name: Option<String>, mimetype: Option<String> },
    Sticker,
    Audio { voice_note: bool },
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image { .. } => "image",
            MessageKind::Video { .. } => "video",
            MessageKind::Document { .. } => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Audio { .. } => "audio",
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

/// The message a reply was quoting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedMessage {
    pub id: String,
    pub participant: Option<String>,
    pub text: Option<String>,
}

/// Normalized view of one inbound event
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub raw: Arc<InboundEvent>,
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    /// Group sender; `None` in private chats
    pub participant_id: Option<String>,
    pub is_group: bool,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub kind: MessageKind,
    /// Body text or media caption
    pub text: String,
    pub quoted: Option<QuotedMessage>,
    pub mentions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl MessageContext {
    pub fn display_name(&self) -> &str {
        self.push_name.as_deref().unwrap_or(&self.sender_id)
    }
}

/// Media reference forwarded untouched to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaSource {
    Url(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Outbound payload. Only `Text` is produced by the core; media variants are
/// built by plugins and forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundContent {
    Text { text: String },
    Image { media: MediaSource, caption: Option<String> },
    Video { media: MediaSource, caption: Option<String> },
    Document {
        media: MediaSource,
        file_name: String,
        mimetype: Option<String>,
    },
    Sticker { media: MediaSource },
    Audio { media: MediaSource, voice_note: bool },
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundContent::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl From<String> for OutboundContent {
    fn from(text: String) -> Self {
        OutboundContent::text(text)
    }
}

impl From<&str> for OutboundContent {
    fn from(text: &str) -> Self {
        OutboundContent::text(text)
    }
}

/// A message addressed to a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub content: OutboundContent,
    /// Id of the message being replied to
    pub quoted: Option<String>,
}

impl OutgoingMessage {
    pub fn new(chat_id: impl Into<String>, content: impl Into<OutboundContent>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            quoted: None,
        }
    }

    pub fn quoting(mut self, message_id: impl Into<String>) -> Self {
        self.quoted = Some(message_id.into());
        self
    }
}

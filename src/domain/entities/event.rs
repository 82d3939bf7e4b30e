//! Inbound event shape delivered by the session collaborator.
//!
//! Mirrors the subset of a WhatsApp Web message record the bot needs. Every
//! field is optional on the wire; normalization decides what is usable.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundEvent {
    pub key: MessageKey,
    pub push_name: Option<String>,
    /// Seconds since the Unix epoch
    #[serde(deserialize_with = "lenient_timestamp")]
    pub message_timestamp: Option<i64>,
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageKey {
    pub remote_jid: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub from_me: bool,
    pub id: String,
    /// Group sender; absent in private chats
    pub participant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePayload {
    pub conversation: Option<String>,
    pub extended_text_message: Option<ExtendedTextMessage>,
    pub image_message: Option<MediaMessage>,
    pub video_message: Option<MediaMessage>,
    pub document_message: Option<DocumentMessage>,
    pub sticker_message: Option<MediaMessage>,
    pub audio_message: Option<AudioMessage>,
    pub reaction_message: Option<serde_json::Value>,
    pub protocol_message: Option<serde_json::Value>,
    pub ephemeral_message: Option<Box<WrappedMessage>>,
    pub view_once_message: Option<Box<WrappedMessage>>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            ..Default::default()
        }
    }

    /// Strip ephemeral / view-once wrappers
    pub fn unwrap_inner(&self) -> &MessagePayload {
        let wrapped = self
            .ephemeral_message
            .as_deref()
            .or(self.view_once_message.as_deref())
            .and_then(|w| w.message.as_ref());

        match wrapped {
            Some(inner) => inner.unwrap_inner(),
            None => self,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WrappedMessage {
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedTextMessage {
    pub text: Option<String>,
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaMessage {
    pub caption: Option<String>,
    pub mimetype: Option<String>,
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMessage {
    pub caption: Option<String>,
    pub mimetype: Option<String>,
    pub file_name: Option<String>,
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioMessage {
    pub mimetype: Option<String>,
    pub ptt: Option<bool>,
    pub seconds: Option<u32>,
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextInfo {
    pub stanza_id: Option<String>,
    pub participant: Option<String>,
    pub quoted_message: Option<Box<MessagePayload>>,
    #[serde(deserialize_with = "lenient_strings")]
    pub mentioned_jid: Vec<String>,
}

// Session bridges serialize protobuf records loosely: 64-bit numbers arrive as
// strings or `{low, high, unsigned}` objects and empty fields as `null`. A
// field that does not fit falls back to its default instead of failing the
// whole event.

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(timestamp_from_value(&Value::deserialize(deserializer)?))
}

fn timestamp_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(long) => {
            let low = long.get("low")?.as_i64()?;
            let high = long.get("high").and_then(Value::as_i64).unwrap_or(0);
            Some((high << 32) | (low & 0xFFFF_FFFF))
        }
        _ => None,
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

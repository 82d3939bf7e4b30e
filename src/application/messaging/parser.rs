//! Message parser - Normalizes inbound events and splits command text

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::entities::event::ContextInfo;
use crate::domain::entities::jid::{self, STATUS_BROADCAST};
use crate::domain::entities::{InboundEvent, MessageContext, MessageKind, MessagePayload, QuotedMessage};

/// Result of looking at a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedText {
    /// No prefix
    Plain,
    /// The prefix and nothing else
    PrefixOnly,
    Command(ParsedCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command word
    pub name: String,
    pub args: Vec<String>,
    /// Remainder after the command word, unsplit
    pub raw_args: String,
}

/// Parses incoming events into [`MessageContext`] values
pub struct MessageParser {
    command_prefix: String,
    respond_to_self: bool,
    self_id: SelfId,
}

/// Yields the bot's own JID. Read on every event, since a session may only
/// learn its identity after it connects.
pub type SelfId = Arc<dyn Fn() -> Option<String> + Send + Sync>;

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
            respond_to_self: false,
            self_id: Arc::new(|| None),
        }
    }

    /// Accept messages sent by the bot's own account, attributing them to `self_id`
    pub fn with_self_messages(mut self, enabled: bool, self_id: SelfId) -> Self {
        self.respond_to_self = enabled;
        self.self_id = self_id;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Build a context, or `None` for events the bot does not act on
    /// (reactions, protocol messages, status broadcasts, empty bodies).
    pub fn normalize(&self, event: InboundEvent) -> Option<MessageContext> {
        let key = &event.key;
        let remote = key.remote_jid.as_str();
        if remote.is_empty() || remote == STATUS_BROADCAST || remote.ends_with("@broadcast") {
            return None;
        }
        if key.from_me && !self.respond_to_self {
            return None;
        }

        let payload = event.message.as_ref()?.unwrap_inner();
        if payload.reaction_message.is_some() || payload.protocol_message.is_some() {
            return None;
        }

        let (kind, text, context_info) = classify(payload)?;
        if kind == MessageKind::Text && text.trim().is_empty() {
            return None;
        }

        let is_group = jid::is_group_jid(remote);
        let own = || if key.from_me { (self.self_id)() } else { None };
        let sender = if is_group {
            key.participant.clone().or_else(own)?
        } else {
            match own() {
                Some(me) => me,
                // Own message with no known self id; the chat JID is the other party
                None if key.from_me => return None,
                None => remote.to_string(),
            }
        };
        let sender_id = jid::bare(&sender);

        let quoted = context_info.and_then(|ci| {
            let id = ci.stanza_id.clone()?;
            Some(QuotedMessage {
                id,
                participant: ci.participant.as_deref().map(jid::bare),
                text: ci.quoted_message.as_deref().and_then(body_text),
            })
        });
        let mentions = context_info
            .map(|ci| ci.mentioned_jid.iter().map(|m| jid::bare(m)).collect())
            .unwrap_or_default();

        let timestamp = event
            .message_timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        let id = key.id.clone();
        let chat_id = remote.to_string();
        let from_me = key.from_me;
        let push_name = event.push_name.clone().filter(|n| !n.is_empty());

        Some(MessageContext {
            raw: Arc::new(event),
            id,
            chat_id,
            participant_id: is_group.then(|| sender_id.clone()),
            sender_id,
            is_group,
            from_me,
            push_name,
            kind,
            text,
            quoted,
            mentions,
            timestamp,
        })
    }

    /// Split `<prefix><command> <args...>`
    pub fn parse_text(&self, text: &str) -> ParsedText {
        let Some(rest) = text.strip_prefix(self.command_prefix.as_str()) else {
            return ParsedText::Plain;
        };

        let rest = rest.trim_start();
        if rest.is_empty() {
            return ParsedText::PrefixOnly;
        }

        let (name, remainder) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        ParsedText::Command(ParsedCommand {
            name: name.to_lowercase(),
            args: remainder.split_whitespace().map(str::to_string).collect(),
            raw_args: remainder.to_string(),
        })
    }
}

/// Kind, text and reply metadata of the innermost payload
fn classify(payload: &MessagePayload) -> Option<(MessageKind, String, Option<&ContextInfo>)> {
    if let Some(text) = &payload.conversation {
        return Some((MessageKind::Text, text.clone(), None));
    }
    if let Some(ext) = &payload.extended_text_message {
        let text = ext.text.clone().unwrap_or_default();
        return Some((MessageKind::Text, text, ext.context_info.as_ref()));
    }
    if let Some(img) = &payload.image_message {
        let kind = MessageKind::Image { mimetype: img.mimetype.clone() };
        return Some((kind, img.caption.clone().unwrap_or_default(), img.context_info.as_ref()));
    }
    if let Some(video) = &payload.video_message {
        let kind = MessageKind::Video { mimetype: video.mimetype.clone() };
        return Some((kind, video.caption.clone().unwrap_or_default(), video.context_info.as_ref()));
    }
    if let Some(doc) = &payload.document_message {
        let kind = MessageKind::Document {
            file_name: doc.file_name.clone(),
            mimetype: doc.mimetype.clone(),
        };
        return Some((kind, doc.caption.clone().unwrap_or_default(), doc.context_info.as_ref()));
    }
    if let Some(sticker) = &payload.sticker_message {
        return Some((MessageKind::Sticker, String::new(), sticker.context_info.as_ref()));
    }
    if let Some(audio) = &payload.audio_message {
        let kind = MessageKind::Audio { voice_note: audio.ptt.unwrap_or(false) };
        return Some((kind, String::new(), audio.context_info.as_ref()));
    }
    None
}

fn body_text(payload: &MessagePayload) -> Option<String> {
    let payload = payload.unwrap_inner();
    payload
        .conversation
        .clone()
        .or_else(|| payload.extended_text_message.as_ref().and_then(|e| e.text.clone()))
        .or_else(|| payload.image_message.as_ref().and_then(|m| m.caption.clone()))
        .or_else(|| payload.video_message.as_ref().and_then(|m| m.caption.clone()))
        .or_else(|| payload.document_message.as_ref().and_then(|m| m.caption.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::event::{ExtendedTextMessage, MediaMessage, WrappedMessage};
    use crate::domain::entities::MessageKey;

    fn parser() -> MessageParser {
        MessageParser::new(".")
    }

    fn command(text: &str) -> ParsedCommand {
        match parser().parse_text(text) {
            ParsedText::Command(cmd) => cmd,
            other => panic!("expected a command for {:?}, got {:?}", text, other),
        }
    }

    fn event(remote: &str, participant: Option<&str>, payload: MessagePayload) -> InboundEvent {
        InboundEvent {
            key: MessageKey {
                remote_jid: remote.to_string(),
                from_me: false,
                id: "MSG1".to_string(),
                participant: participant.map(str::to_string),
            },
            push_name: Some("Ana".to_string()),
            message_timestamp: Some(1_700_000_000),
            message: Some(payload),
        }
    }

    #[test]
    fn splits_name_and_args() {
        let cmd = command(".remind 30min Call mom");
        assert_eq!(cmd.name, "remind");
        assert_eq!(cmd.args, ["30min", "Call", "mom"]);
        assert_eq!(cmd.raw_args, "30min Call mom");
    }

    #[test]
    fn folds_case_and_tolerates_whitespace() {
        assert_eq!(command(".HELP").name, "help");
        assert_eq!(command(".   help").name, "help");
        assert_eq!(command(".help\tme").args, ["me"]);
    }

    #[test]
    fn empty_args() {
        let cmd = command(".help");
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.raw_args, "");
    }

    #[test]
    fn prefix_alone_is_not_a_command() {
        assert_eq!(parser().parse_text("."), ParsedText::PrefixOnly);
        assert_eq!(parser().parse_text(".   "), ParsedText::PrefixOnly);
        assert_eq!(parser().parse_text("hello ."), ParsedText::Plain);
    }

    #[test]
    fn prefix_inside_args_is_kept() {
        let cmd = command(".calc 1.5 .x ..");
        assert_eq!(cmd.args, ["1.5", ".x", ".."]);
        assert_eq!(cmd.raw_args, "1.5 .x ..");
    }

    #[test]
    fn raw_args_keep_inner_spacing() {
        let cmd = command(".say  hello   world  ");
        assert_eq!(cmd.raw_args, "hello   world");
        assert_eq!(cmd.args, ["hello", "world"]);
    }

    #[test]
    fn multi_char_prefix() {
        let parser = MessageParser::new("!!");
        assert!(matches!(parser.parse_text("!!ping"), ParsedText::Command(c) if c.name == "ping"));
        assert_eq!(parser.parse_text("!ping"), ParsedText::Plain);
    }

    #[test]
    fn normalizes_private_text() {
        let ctx = parser()
            .normalize(event("628123@s.whatsapp.net", None, MessagePayload::text(".ping")))
            .unwrap();
        assert_eq!(ctx.sender_id, "628123@s.whatsapp.net");
        assert_eq!(ctx.chat_id, "628123@s.whatsapp.net");
        assert!(!ctx.is_group);
        assert!(ctx.participant_id.is_none());
        assert_eq!(ctx.kind, MessageKind::Text);
        assert_eq!(ctx.text, ".ping");
        assert_eq!(ctx.id, "MSG1");
        assert_eq!(ctx.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(ctx.display_name(), "Ana");
    }

    #[test]
    fn group_sender_is_the_participant() {
        let ctx = parser()
            .normalize(event(
                "120363@g.us",
                Some("628999:4@s.whatsapp.net"),
                MessagePayload::text("hi"),
            ))
            .unwrap();
        assert!(ctx.is_group);
        assert_eq!(ctx.sender_id, "628999@s.whatsapp.net");
        assert_eq!(ctx.participant_id.as_deref(), Some("628999@s.whatsapp.net"));
    }

    #[test]
    fn group_message_without_participant_is_dropped() {
        assert!(parser()
            .normalize(event("120363@g.us", None, MessagePayload::text("hi")))
            .is_none());
    }

    #[test]
    fn ignores_irrelevant_events() {
        let p = parser();
        let reaction = MessagePayload {
            reaction_message: Some(serde_json::json!({"text": "👍"})),
            ..Default::default()
        };
        assert!(p.normalize(event("628@s.whatsapp.net", None, reaction)).is_none());

        let protocol = MessagePayload {
            protocol_message: Some(serde_json::json!({"type": 0})),
            ..Default::default()
        };
        assert!(p.normalize(event("628@s.whatsapp.net", None, protocol)).is_none());

        assert!(p
            .normalize(event(STATUS_BROADCAST, Some("628@s.whatsapp.net"), MessagePayload::text("x")))
            .is_none());
        assert!(p
            .normalize(event("628@s.whatsapp.net", None, MessagePayload::text("   ")))
            .is_none());
        assert!(p
            .normalize(event("628@s.whatsapp.net", None, MessagePayload::default()))
            .is_none());

        let mut own = event("628@s.whatsapp.net", None, MessagePayload::text(".ping"));
        own.key.from_me = true;
        assert!(p.normalize(own).is_none());
    }

    #[test]
    fn own_messages_when_enabled() {
        let p = parser().with_self_messages(true, Arc::new(|| Some("62800:2@s.whatsapp.net".to_string())));
        let mut own = event("628@s.whatsapp.net", None, MessagePayload::text(".ping"));
        own.key.from_me = true;
        let ctx = p.normalize(own).unwrap();
        assert_eq!(ctx.sender_id, "62800@s.whatsapp.net");
        assert!(ctx.from_me);

        let anonymous = parser().with_self_messages(true, Arc::new(|| None));
        let mut own = event("628@s.whatsapp.net", None, MessagePayload::text(".ping"));
        own.key.from_me = true;
        assert!(anonymous.normalize(own).is_none());
    }

    #[test]
    fn unwraps_ephemeral_and_reads_captions_and_quotes() {
        let inner = MessagePayload {
            image_message: Some(MediaMessage {
                caption: Some(".sticker".to_string()),
                mimetype: Some("image/jpeg".to_string()),
                context_info: Some(ContextInfo {
                    stanza_id: Some("Q1".to_string()),
                    participant: Some("628777:1@s.whatsapp.net".to_string()),
                    quoted_message: Some(Box::new(MessagePayload {
                        extended_text_message: Some(ExtendedTextMessage {
                            text: Some("original".to_string()),
                            context_info: None,
                        }),
                        ..Default::default()
                    })),
                    mentioned_jid: vec!["628555@s.whatsapp.net".to_string()],
                }),
            }),
            ..Default::default()
        };
        let wrapped = MessagePayload {
            ephemeral_message: Some(Box::new(WrappedMessage { message: Some(inner) })),
            ..Default::default()
        };

        let ctx = parser()
            .normalize(event("628@s.whatsapp.net", None, wrapped))
            .unwrap();
        assert_eq!(ctx.kind, MessageKind::Image { mimetype: Some("image/jpeg".to_string()) });
        assert_eq!(ctx.text, ".sticker");
        let quoted = ctx.quoted.unwrap();
        assert_eq!(quoted.id, "Q1");
        assert_eq!(quoted.participant.as_deref(), Some("628777@s.whatsapp.net"));
        assert_eq!(quoted.text.as_deref(), Some("original"));
        assert_eq!(ctx.mentions, ["628555@s.whatsapp.net"]);
    }

    #[test]
    fn stickers_without_text_are_still_relevant() {
        let payload = MessagePayload {
            sticker_message: Some(MediaMessage::default()),
            ..Default::default()
        };
        let ctx = parser().normalize(event("628@s.whatsapp.net", None, payload)).unwrap();
        assert_eq!(ctx.kind, MessageKind::Sticker);
        assert!(ctx.text.is_empty());
    }

    #[test]
    fn parses_baileys_json() {
        let raw = r#"{
            "key": {"remoteJid": "120363@g.us", "fromMe": false, "id": "3EB0", "participant": "628111@s.whatsapp.net"},
            "pushName": "Budi",
            "messageTimestamp": 1700000100,
            "message": {"extendedTextMessage": {"text": ".menu", "contextInfo": {"stanzaId": "ABC"}}}
        }"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        let ctx = parser().normalize(event).unwrap();
        assert_eq!(ctx.text, ".menu");
        assert_eq!(ctx.sender_id, "628111@s.whatsapp.net");
        assert_eq!(ctx.quoted.unwrap().id, "ABC");
    }

    fn ping_json(timestamp: &str, from_me: &str, mentions: &str) -> String {
        format!(
            r#"{{
                "key": {{"remoteJid": "628111@s.whatsapp.net", "fromMe": {from_me}, "id": "3EB1"}},
                "messageTimestamp": {timestamp},
                "message": {{"extendedTextMessage": {{"text": ".ping", "contextInfo": {{"mentionedJid": {mentions}}}}}}}
            }}"#
        )
    }

    #[test]
    fn long_object_timestamp_is_accepted() {
        let raw = ping_json(r#"{"low":1700000000,"high":0,"unsigned":true}"#, "false", "[]");
        let event: InboundEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.message_timestamp, Some(1_700_000_000));
        let ctx = parser().normalize(event).unwrap();
        assert_eq!(ctx.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn string_timestamp_is_accepted() {
        let raw = ping_json(r#""1700000000""#, "false", "[]");
        let event: InboundEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.message_timestamp, Some(1_700_000_000));
        assert_eq!(parser().normalize(event).unwrap().text, ".ping");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let raw = ping_json("null", "null", "null");
        let event: InboundEvent = serde_json::from_str(&raw).unwrap();
        assert!(!event.key.from_me);
        assert_eq!(event.message_timestamp, None);

        let ctx = parser().normalize(event).unwrap();
        assert!(ctx.mentions.is_empty());
        assert_eq!(ctx.sender_id, "628111@s.whatsapp.net");
    }

    #[test]
    fn odd_timestamp_shapes_do_not_drop_the_event() {
        let raw = ping_json(r#"["x"]"#, "false", r#"["628222@s.whatsapp.net", 7]"#);
        let event: InboundEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.message_timestamp, None);
        let ctx = parser().normalize(event).unwrap();
        assert_eq!(ctx.mentions, ["628222@s.whatsapp.net"]);
    }
}

//! Console adapter for development/testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{InboundEvent, MessageKey, MessagePayload, OutboundContent, OutgoingMessage};
use crate::domain::traits::{Bot, BotInfo};

/// Console bot adapter for local development.
///
/// Every stdin line becomes a private text message from `sender`; replies
/// are printed to stdout.
pub struct ConsoleAdapter {
    info: BotInfo,
    sender: String,
    counter: AtomicU64,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            info: BotInfo {
                id: Some("console@s.whatsapp.net".to_string()),
                name: name.into(),
            },
            sender: sender.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Turn one typed line into an inbound event
    pub fn line_event(&self, line: &str) -> InboundEvent {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        InboundEvent {
            key: MessageKey {
                remote_jid: self.sender.clone(),
                from_me: false,
                id: format!("CONSOLE{}", n),
                participant: None,
            },
            push_name: Some("console".to_string()),
            message_timestamp: Some(chrono::Utc::now().timestamp()),
            message: Some(MessagePayload::text(line)),
        }
    }

    /// Forward lines from `reader` until EOF or `/quit`
    pub async fn pump<R>(&self, reader: R, events: mpsc::Sender<InboundEvent>) -> Result<(), BotError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }
            if events.send(self.line_event(line)).await.is_err() {
                return Err(BotError::SessionClosed);
            }
        }
        Ok(())
    }
}

fn render(content: &OutboundContent) -> String {
    match content {
        OutboundContent::Text { text } => text.clone(),
        OutboundContent::Image { caption, .. } => format!("<image> {}", caption.as_deref().unwrap_or("")),
        OutboundContent::Video { caption, .. } => format!("<video> {}", caption.as_deref().unwrap_or("")),
        OutboundContent::Document { file_name, .. } => format!("<document {}>", file_name),
        OutboundContent::Sticker { .. } => "<sticker>".to_string(),
        OutboundContent::Audio { voice_note, .. } => {
            if *voice_note {
                "<voice note>".to_string()
            } else {
                "<audio>".to_string()
            }
        }
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self, events: mpsc::Sender<InboundEvent>) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode) as {}", self.sender);
        println!("Type messages as {}. /quit to exit.", self.sender);
        self.pump(BufReader::new(tokio::io::stdin()), events).await
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BotError> {
        println!("[BOT] {}", render(&message.content));
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("CONSOLE{}", n))
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

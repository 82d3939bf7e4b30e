//! Bridge adapter - talks to a WhatsApp Web session sidecar over JSON lines.
//!
//! The sidecar writes one JSON object per line to our stdin:
//!
//! ```text
//! {"type":"ready","id":"62811...@s.whatsapp.net","name":"wabot"}
//! {"type":"message","event":{"key":{...},"message":{...}}}
//! {"type":"sent","requestId":"...","messageId":"..."}
//! {"type":"error","requestId":"...","error":"..."}
//! {"type":"closed","reason":"logged out"}
//! ```
//!
//! and reads send requests from our stdout:
//!
//! ```text
//! {"type":"send","requestId":"...","chatId":"...","content":{"type":"text","text":"..."},"quoted":null}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{InboundEvent, OutboundContent, OutgoingMessage};
use crate::domain::traits::{Bot, BotInfo};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Lines the sidecar sends us
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum SidecarLine {
    Ready {
        id: Option<String>,
        name: Option<String>,
    },
    Message {
        event: InboundEvent,
    },
    Sent {
        request_id: String,
        message_id: String,
    },
    Error {
        request_id: Option<String>,
        error: String,
    },
    Closed {
        reason: Option<String>,
    },
}

/// Lines we send to the sidecar
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum BridgeCommand<'a> {
    Send {
        request_id: &'a str,
        chat_id: &'a str,
        content: &'a OutboundContent,
        quoted: Option<&'a str>,
    },
}

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type Pending = oneshot::Sender<Result<String, String>>;

pub struct BridgeAdapter {
    name: String,
    reader: Mutex<Option<Reader>>,
    writer: tokio::sync::Mutex<Writer>,
    pending: Mutex<HashMap<String, Pending>>,
    self_id: RwLock<Option<String>>,
    send_timeout: Duration,
}

impl BridgeAdapter {
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            reader: Mutex::new(Some(Box::new(reader))),
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: Mutex::new(HashMap::new()),
            self_id: RwLock::new(None),
            send_timeout: SEND_TIMEOUT,
        }
    }

    /// Bridge over the process's own stdin/stdout
    pub fn stdio(name: impl Into<String>) -> Self {
        Self::new(name, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    fn settle(&self, request_id: &str, result: Result<String, String>) {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!("Reply for unknown request {}", request_id),
        }
    }

    /// Handle one line. Returns `false` once the session is over.
    async fn handle_line(&self, line: &str, events: &mpsc::Sender<InboundEvent>) -> Result<bool, BotError> {
        let parsed = match serde_json::from_str::<SidecarLine>(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ignoring malformed bridge line: {}", e);
                return Ok(true);
            }
        };

        match parsed {
            SidecarLine::Ready { id, name } => {
                info!(
                    "Session ready as {} ({})",
                    id.as_deref().unwrap_or("unknown"),
                    name.as_deref().unwrap_or(&self.name)
                );
                *self.self_id.write().unwrap_or_else(|p| p.into_inner()) = id;
            }
            SidecarLine::Message { event } => {
                if events.send(event).await.is_err() {
                    return Err(BotError::SessionClosed);
                }
            }
            SidecarLine::Sent { request_id, message_id } => self.settle(&request_id, Ok(message_id)),
            SidecarLine::Error { request_id: Some(id), error } => self.settle(&id, Err(error)),
            SidecarLine::Error { request_id: None, error } => warn!("Sidecar error: {}", error),
            SidecarLine::Closed { reason } => {
                info!("Session closed: {}", reason.as_deref().unwrap_or("no reason"));
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn fail_pending(&self) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .collect();
        for (_, tx) in drained {
            let _ = tx.send(Err("session closed".to_string()));
        }
    }
}

#[async_trait]
impl Bot for BridgeAdapter {
    async fn start(&self, events: mpsc::Sender<InboundEvent>) -> Result<(), BotError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| BotError::Internal("bridge already started".to_string()))?;

        info!("Waiting for session sidecar on stdin");
        let mut lines = reader.lines();
        let result = loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match self.handle_line(&line, &events).await {
                    Ok(true) => continue,
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(BotError::Io(e)),
            }
        };

        self.fail_pending();
        result
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BotError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let command = BridgeCommand::Send {
            request_id: &request_id,
            chat_id: &message.chat_id,
            content: &message.content,
            quoted: message.quoted.as_deref(),
        };
        let mut line = serde_json::to_string(&command)
            .map_err(|e| BotError::Send(format!("encode failed: {}", e)))?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(request_id.clone(), tx);

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            self.settle(&request_id, Err(String::new()));
            return Err(BotError::Io(e));
        }

        match tokio::time::timeout(self.send_timeout, rx).await {
            Ok(Ok(Ok(message_id))) => Ok(message_id),
            Ok(Ok(Err(error))) => Err(BotError::Send(error)),
            Ok(Err(_)) => Err(BotError::SessionClosed),
            Err(_) => {
                self.settle(&request_id, Err(String::new()));
                Err(BotError::Send(format!("no reply from session within {:?}", self.send_timeout)))
            }
        }
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: self.self_id.read().unwrap_or_else(|p| p.into_inner()).clone(),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{duplex, DuplexStream};

    struct Sidecar {
        to_bot: DuplexStream,
        from_bot: tokio::io::Lines<BufReader<DuplexStream>>,
    }

    fn connect() -> (Arc<BridgeAdapter>, Sidecar) {
        let (to_bot, bot_in) = duplex(4096);
        let (bot_out, from_bot) = duplex(4096);
        let adapter = BridgeAdapter::new("wabot", BufReader::new(bot_in), bot_out)
            .with_send_timeout(Duration::from_secs(2));
        (
            Arc::new(adapter),
            Sidecar {
                to_bot,
                from_bot: BufReader::new(from_bot).lines(),
            },
        )
    }

    #[tokio::test]
    async fn forwards_events_and_tracks_identity() {
        let (adapter, mut sidecar) = connect();
        let (tx, mut rx) = mpsc::channel(8);
        let runner = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.start(tx).await })
        };

        sidecar
            .to_bot
            .write_all(
                concat!(
                    r#"{"type":"ready","id":"6289900000000@s.whatsapp.net"}"#, "\n",
                    "not json\n",
                    r#"{"type":"message","event":{"key":{"remoteJid":"6281200000000@s.whatsapp.net","id":"A1"},"message":{"conversation":".ping"}}}"#, "\n",
                    r#"{"type":"closed","reason":"logout"}"#, "\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key.id, "A1");
        assert_eq!(event.message.unwrap().conversation.as_deref(), Some(".ping"));

        runner.await.unwrap().unwrap();
        assert_eq!(adapter.bot_info().id.as_deref(), Some("6289900000000@s.whatsapp.net"));
        assert!(adapter.start(mpsc::channel(1).0).await.is_err());
    }

    #[tokio::test]
    async fn send_waits_for_the_matching_ack() {
        let (adapter, mut sidecar) = connect();
        let (tx, _rx) = mpsc::channel(8);
        {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.start(tx).await });
        }

        let sending = {
            let adapter = adapter.clone();
            tokio::spawn(async move {
                adapter
                    .send(OutgoingMessage::new("6281200000000@s.whatsapp.net", "pong").quoting("A1"))
                    .await
            })
        };

        let line = sidecar.from_bot.next_line().await.unwrap().unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(request["type"], "send");
        assert_eq!(request["chatId"], "6281200000000@s.whatsapp.net");
        assert_eq!(request["content"], serde_json::json!({"type": "text", "text": "pong"}));
        assert_eq!(request["quoted"], "A1");

        let ack = format!(
            "{{\"type\":\"sent\",\"requestId\":\"{}\",\"messageId\":\"OUT1\"}}\n",
            request["requestId"].as_str().unwrap()
        );
        sidecar.to_bot.write_all(ack.as_bytes()).await.unwrap();

        assert_eq!(sending.await.unwrap().unwrap(), "OUT1");
    }

    #[tokio::test]
    async fn send_error_and_closed_session() {
        let (adapter, mut sidecar) = connect();
        let (tx, _rx) = mpsc::channel(8);
        let runner = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.start(tx).await })
        };

        let sending = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.send(OutgoingMessage::new("x@g.us", "hi")).await })
        };
        let line = sidecar.from_bot.next_line().await.unwrap().unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        let nack = format!(
            "{{\"type\":\"error\",\"requestId\":\"{}\",\"error\":\"not in group\"}}\n",
            request["requestId"].as_str().unwrap()
        );
        sidecar.to_bot.write_all(nack.as_bytes()).await.unwrap();
        assert!(matches!(sending.await.unwrap(), Err(BotError::Send(e)) if e == "not in group"));

        let pending = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.send(OutgoingMessage::new("x@g.us", "again")).await })
        };
        sidecar.from_bot.next_line().await.unwrap().unwrap();
        drop(sidecar.to_bot);
        runner.await.unwrap().unwrap();
        assert!(matches!(pending.await.unwrap(), Err(BotError::Send(e)) if e == "session closed"));
    }
}

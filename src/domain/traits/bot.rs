use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::domain::entities::{InboundEvent, OutgoingMessage};
use crate::application::errors::BotError;

/// Bot trait - abstraction over the WhatsApp session collaborator
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the session and forward inbound events until it closes
    async fn start(&self, events: mpsc::Sender<InboundEvent>) -> Result<(), BotError>;

    /// Send a message to a chat, returning the id assigned to it
    async fn send(&self, message: OutgoingMessage) -> Result<String, BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    /// JID of the logged-in account, when known
    pub id: Option<String>,
    pub name: String,
}

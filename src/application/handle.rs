//! Bot handle - the facade handed to plugins and command handlers

use std::sync::Arc;

use crate::application::errors::{BotError, CommandError};
use crate::application::services::permission_service::PermissionService;
use crate::application::services::stats::{Stats, StatsSnapshot};
use crate::domain::entities::jid::Jid;
use crate::domain::entities::{
    Command, CommandRegistry, MessageContext, OutboundContent, OutgoingMessage, SharedRegistry,
};
use crate::domain::traits::Bot;
use crate::plugins::manager::{LoadReport, PluginLoader};

/// Settings every component reads but never changes
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub name: String,
    pub prefix: String,
    pub owner: Jid,
}

struct HandleInner {
    bot: Arc<dyn Bot>,
    registry: SharedRegistry,
    permissions: PermissionService,
    stats: Stats,
    settings: BotSettings,
    loader: PluginLoader,
}

/// Cheap to clone; every clone shares the same state
#[derive(Clone)]
pub struct BotHandle {
    inner: Arc<HandleInner>,
}

impl BotHandle {
    pub fn new(
        bot: Arc<dyn Bot>,
        permissions: PermissionService,
        settings: BotSettings,
        loader: PluginLoader,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                bot,
                registry: SharedRegistry::default(),
                permissions,
                stats: Stats::new(),
                settings,
                loader,
            }),
        }
    }

    /// Send content to a chat
    pub async fn send(
        &self,
        chat_id: &str,
        content: impl Into<OutboundContent>,
    ) -> Result<String, BotError> {
        self.send_message(OutgoingMessage::new(chat_id, content)).await
    }

    pub async fn send_message(&self, message: OutgoingMessage) -> Result<String, BotError> {
        self.inner.bot.send(message).await
    }

    /// Current registry snapshot
    pub fn registry(&self) -> Arc<CommandRegistry> {
        self.inner.registry.snapshot()
    }

    pub fn shared_registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    /// Register a command at runtime. It lives until the next plugin reload.
    pub fn register_command(&self, command: Command) -> Result<Option<Arc<Command>>, CommandError> {
        self.inner.registry.register(command)
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.inner.permissions
    }

    pub fn counters(&self) -> &Stats {
        &self.inner.stats
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot(self.inner.registry.len())
    }

    pub fn settings(&self) -> &BotSettings {
        &self.inner.settings
    }

    pub fn prefix(&self) -> &str {
        &self.inner.settings.prefix
    }

    pub fn is_owner(&self, identity: &str) -> bool {
        Jid::parse(identity)
            .map(|j| j.same_user(&self.inner.settings.owner))
            .unwrap_or(false)
    }

    pub async fn load_plugins(&self) -> LoadReport {
        self.inner.loader.load_all(self).await
    }

    pub async fn reload_plugins(&self) -> LoadReport {
        self.inner.loader.reload(self).await
    }

    pub fn last_load_report(&self) -> Option<Arc<LoadReport>> {
        self.inner.loader.last_report()
    }
}

/// One command call as seen by its handler
#[derive(Clone)]
pub struct Invocation {
    pub bot: BotHandle,
    pub message: Arc<MessageContext>,
    pub command: Arc<Command>,
    /// Name or alias the user typed, lowercased
    pub invoked_as: String,
    pub args: Vec<String>,
    /// Everything after the command word, unsplit
    pub raw_args: String,
}

impl Invocation {
    /// Reply in the same chat, quoting the triggering message
    pub async fn reply(&self, content: impl Into<OutboundContent>) -> Result<String, BotError> {
        let message = OutgoingMessage::new(&self.message.chat_id, content).quoting(&self.message.id);
        self.bot.send_message(message).await
    }

    /// Send to the same chat without quoting
    pub async fn send(&self, content: impl Into<OutboundContent>) -> Result<String, BotError> {
        self.bot.send(&self.message.chat_id, content).await
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn is_owner(&self) -> bool {
        self.bot.is_owner(&self.message.sender_id)
    }

    pub fn usage(&self) -> String {
        self.command.usage_line(self.bot.prefix())
    }

    /// Error for handlers that received the wrong arguments
    pub fn invalid_args(&self) -> CommandError {
        CommandError::InvalidArgs(self.usage())
    }
}

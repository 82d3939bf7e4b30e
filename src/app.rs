//! Wiring - builds the handle and dispatcher from configuration and runs the session

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::errors::{BotError, ConfigError};
use crate::application::handle::{BotHandle, BotSettings};
use crate::application::messaging::{MessageDispatcher, MessageParser, RateLimiter};
use crate::application::services::PermissionService;
use crate::domain::entities::Jid;
use crate::domain::traits::{Bot, PermissionStore};
use crate::infrastructure::adapters::{BridgeAdapter, ConsoleAdapter};
use crate::infrastructure::config::Config;
use crate::infrastructure::storage;
use crate::plugins::{LoadReport, PluginLoader, PluginRecord};

const EVENT_QUEUE: usize = 256;
const PRUNE_EVERY: Duration = Duration::from_secs(300);

/// A fully wired bot, ready to run
pub struct App {
    bot: Arc<dyn Bot>,
    handle: BotHandle,
    dispatcher: Arc<MessageDispatcher>,
}

impl App {
    /// Wire everything with the permission store named in the configuration
    pub async fn build(config: &Config, bot: Arc<dyn Bot>, plugins: Vec<PluginRecord>) -> Result<Self, BotError> {
        let store = storage::open(&config.permissions).await?;
        Self::with_store(config, bot, store, plugins).await
    }

    pub async fn with_store(
        config: &Config,
        bot: Arc<dyn Bot>,
        store: Arc<dyn PermissionStore>,
        plugins: Vec<PluginRecord>,
    ) -> Result<Self, BotError> {
        config.validate()?;
        let owner = config.owner_jid()?;

        let permissions = PermissionService::load(store, owner.clone()).await?;
        let settings = BotSettings {
            name: config.bot.name.clone(),
            prefix: config.bot.prefix.clone(),
            owner,
        };
        let loader = PluginLoader::new(plugins).with_disabled(&config.plugins.disabled);
        let handle = BotHandle::new(bot.clone(), permissions, settings, loader);

        let session = Arc::clone(&bot);
        let parser = MessageParser::new(config.bot.prefix.clone())
            .with_self_messages(config.dispatch.respond_to_self, Arc::new(move || session.bot_info().id));
        let mut dispatcher = MessageDispatcher::new(handle.clone(), parser, config.dispatch_policy());
        if config.rate_limit.enabled {
            dispatcher = dispatcher.with_rate_limiter(RateLimiter::new(
                config.rate_limit.max_requests,
                config.rate_limit.window_seconds,
            ));
        }

        Ok(Self {
            bot,
            handle,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn handle(&self) -> &BotHandle {
        &self.handle
    }

    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    pub async fn load_plugins(&self) -> LoadReport {
        let report = self.handle.load_plugins().await;
        for failure in &report.failed {
            warn!("Plugin {} not loaded: {}", failure.name, failure.error);
        }
        report
    }

    /// Load plugins, then pump session events through the dispatcher until
    /// the session ends.
    pub async fn run(self) -> Result<(), BotError> {
        self.load_plugins().await;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let dispatcher = Arc::clone(&self.dispatcher);
        let pump = tokio::spawn(dispatcher.run(rx));

        let pruner = {
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(PRUNE_EVERY);
                loop {
                    tick.tick().await;
                    dispatcher.prune();
                }
            })
        };

        let info = self.bot.bot_info();
        info!("{} running with prefix '{}'", info.name, self.handle.prefix());
        let result = self.bot.start(tx).await;

        pruner.abort();
        if let Err(e) = pump.await {
            warn!("Dispatcher task ended abnormally: {}", e);
        }
        info!("Session ended; {} messages seen", self.handle.stats().messages_received);
        result
    }
}

/// Pick the session adapter the configuration enables. The bridge wins when
/// both are on, since it owns stdin.
pub fn select_adapter(config: &Config) -> Result<Arc<dyn Bot>, BotError> {
    if config.adapters.bridge.enabled {
        return Ok(Arc::new(BridgeAdapter::stdio(config.bot.name.clone())));
    }
    if config.adapters.console.enabled {
        let sender = console_sender(config)?;
        return Ok(Arc::new(ConsoleAdapter::new(config.bot.name.clone(), sender)));
    }
    Err(BotError::Internal(
        "no adapter enabled; turn on adapters.console or adapters.bridge".to_string(),
    ))
}

/// JID console lines are attributed to. Accepts the same phone-number forms
/// as `bot.owner`.
fn console_sender(config: &Config) -> Result<String, BotError> {
    match &config.adapters.console.sender {
        Some(sender) => Jid::resolve(sender)
            .filter(Jid::is_user)
            .map(|jid| jid.to_bare())
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "adapters.console.sender '{}' is not a phone number or JID",
                    sender
                ))
                .into()
            }),
        None => Ok(config.owner_jid()?.to_string()),
    }
}

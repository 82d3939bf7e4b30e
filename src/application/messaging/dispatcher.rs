//! Message dispatcher - Routes inbound events to command handlers

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::middleware::RateLimiter;
use super::parser::{MessageParser, ParsedCommand, ParsedText};
use crate::application::errors::{CommandError, DispatchError};
use crate::application::handle::{BotHandle, Invocation};
use crate::domain::entities::{Command, CommandRegistry, InboundEvent, MessageContext, OutgoingMessage};

pub const NOT_AUTHORIZED: &str = "You are not authorized to use this command.";
pub const COMMAND_FAILED: &str = "Command failed. Please try again later.";

/// How the dispatcher answers the caller on the non-happy paths
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub reply_unknown: bool,
    pub notify_denied: bool,
    pub reply_on_error: bool,
    pub handler_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            reply_unknown: false,
            notify_denied: true,
            reply_on_error: true,
            handler_timeout: Duration::from_secs(60),
        }
    }
}

/// What happened to one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a message the bot acts on
    Ignored,
    /// Plain message handed to listeners
    Passive,
    /// Just the prefix
    Empty,
    Unknown(String),
    Denied(String),
    RateLimited(String),
    /// Handler rejected its arguments; usage was sent
    BadArgs(String),
    Executed(String),
    Failed(String),
}

/// Message dispatcher - normalizes, resolves, authorizes and runs commands
pub struct MessageDispatcher {
    parser: MessageParser,
    handle: BotHandle,
    policy: DispatchPolicy,
    limiter: Option<RateLimiter>,
}

impl MessageDispatcher {
    pub fn new(handle: BotHandle, parser: MessageParser, policy: DispatchPolicy) -> Self {
        Self {
            parser,
            handle,
            policy,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn handle(&self) -> &BotHandle {
        &self.handle
    }

    /// Forget rate-limit history of senders that went quiet
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.prune();
        }
    }

    /// Receive events until the channel closes. Every event gets its own task,
    /// so a slow handler never holds up the next message.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<InboundEvent>) {
        info!("Dispatcher started with prefix '{}'", self.parser.prefix());
        while let Some(event) = events.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.dispatch(event).await;
            });
        }
        info!("Inbound event stream closed");
    }

    /// Process one inbound event. Never fails; every error ends up logged.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let Some(ctx) = self.parser.normalize(event) else {
            return DispatchOutcome::Ignored;
        };
        let ctx = Arc::new(ctx);
        let stats = self.handle.counters();
        stats.record_message();

        debug!(
            "[{}] {} ({}): {}",
            ctx.chat_id,
            ctx.sender_id,
            ctx.kind.as_str(),
            ctx.text.chars().take(50).collect::<String>()
        );

        let parsed = match self.parser.parse_text(&ctx.text) {
            ParsedText::Command(parsed) => parsed,
            ParsedText::PrefixOnly => return DispatchOutcome::Empty,
            ParsedText::Plain => {
                self.run_listeners(&ctx).await;
                return DispatchOutcome::Passive;
            }
        };

        let registry = self.handle.registry();
        let command = match resolve(&registry, &parsed.name) {
            Ok(command) => command,
            Err(e) => {
                stats.record_unknown();
                debug!("[{}] {}", ctx.chat_id, e);
                if self.policy.reply_unknown {
                    let text = format!(
                        "Unknown command. Send {}help for the list.",
                        self.parser.prefix()
                    );
                    self.notify(&ctx, text).await;
                }
                return DispatchOutcome::Unknown(parsed.name);
            }
        };

        if let Err(e) = self.authorize(&command, &ctx).await {
            stats.record_denied();
            if self.policy.notify_denied {
                self.notify(&ctx, NOT_AUTHORIZED).await;
            }
            warn!("[{}] {}: {}", ctx.chat_id, ctx.sender_id, e);
            return DispatchOutcome::Denied(command.name.clone());
        }

        if let Some(limiter) = &self.limiter {
            if !self.handle.is_owner(&ctx.sender_id) {
                if let Err(e) = limiter.check(&ctx.sender_id) {
                    stats.record_rate_limited();
                    debug!("[{}] {} {}", ctx.chat_id, ctx.sender_id, e);
                    return DispatchOutcome::RateLimited(command.name.clone());
                }
            }
        }

        let name = command.name.clone();
        let invocation = self.invocation(command.clone(), ctx.clone(), parsed);
        match self.execute(&command, invocation).await {
            Ok(()) => {
                stats.record_executed();
                info!("[{}] {} ran {}", ctx.chat_id, ctx.sender_id, name);
                DispatchOutcome::Executed(name)
            }
            Err(DispatchError::HandlerExecution {
                source: CommandError::InvalidArgs(usage),
                ..
            }) => {
                debug!("[{}] bad arguments for {}", ctx.chat_id, name);
                self.notify(&ctx, format!("Usage: {}", usage)).await;
                DispatchOutcome::BadArgs(name)
            }
            Err(e) => {
                stats.record_error();
                error!("[{}] {}", ctx.chat_id, e);
                if self.policy.reply_on_error {
                    self.notify(&ctx, COMMAND_FAILED).await;
                }
                DispatchOutcome::Failed(name)
            }
        }
    }

    async fn authorize(&self, command: &Command, ctx: &MessageContext) -> Result<(), DispatchError> {
        let decision = self.handle.permissions().evaluate(command, ctx).await;
        if decision.is_allowed() {
            debug!("{} allowed for {} ({})", command.name, ctx.sender_id, decision.as_str());
            Ok(())
        } else {
            Err(DispatchError::PermissionDenied {
                command: format!("{} ({})", command.name, decision.as_str()),
            })
        }
    }

    fn invocation(&self, command: Arc<Command>, message: Arc<MessageContext>, parsed: ParsedCommand) -> Invocation {
        Invocation {
            bot: self.handle.clone(),
            message,
            command,
            invoked_as: parsed.name,
            args: parsed.args,
            raw_args: parsed.raw_args,
        }
    }

    /// Run the handler in its own task under the configured timeout
    async fn execute(&self, command: &Command, invocation: Invocation) -> Result<(), DispatchError> {
        let failed = |source: CommandError| DispatchError::HandlerExecution {
            command: command.name.clone(),
            plugin: command.plugin.clone(),
            source,
        };

        let handler = command.handler().cloned().ok_or_else(|| {
            failed(CommandError::InvalidDefinition("no handler".to_string()))
        })?;

        let timeout = self.policy.handler_timeout;
        let task = tokio::spawn(async move { tokio::time::timeout(timeout, handler(invocation)).await });

        match task.await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(source))) => Err(failed(source)),
            Ok(Err(_elapsed)) => Err(DispatchError::HandlerTimeout {
                command: command.name.clone(),
                plugin: command.plugin.clone(),
                after: timeout,
            }),
            Err(join) if join.is_panic() => Err(DispatchError::HandlerPanicked {
                command: command.name.clone(),
                plugin: command.plugin.clone(),
            }),
            Err(join) => Err(failed(CommandError::ExecutionFailed(join.to_string()))),
        }
    }

    /// Hand a plain message to every listener, each isolated like a handler
    async fn run_listeners(&self, ctx: &Arc<MessageContext>) {
        let registry = self.handle.registry();
        let timeout = self.policy.handler_timeout;

        let tasks: Vec<_> = registry
            .listeners()
            .iter()
            .map(|listener| {
                let listener = Arc::clone(listener);
                let bot = self.handle.clone();
                let message = Arc::clone(ctx);
                tokio::spawn(async move {
                    let name = listener.name().to_string();
                    let result = tokio::time::timeout(timeout, listener.on_message(bot, message)).await;
                    (name, result)
                })
            })
            .collect();

        for task in tasks {
            match task.await {
                Ok((_, Ok(Ok(())))) => {}
                Ok((name, Ok(Err(e)))) => {
                    self.handle.counters().record_error();
                    warn!("Listener {} failed: {}", name, e);
                }
                Ok((name, Err(_))) => {
                    self.handle.counters().record_error();
                    warn!("Listener {} timed out after {:?}", name, timeout);
                }
                Err(e) => {
                    self.handle.counters().record_error();
                    error!("Listener task failed: {}", e);
                }
            }
        }
    }

    async fn notify(&self, ctx: &MessageContext, text: impl Into<String>) {
        let message = OutgoingMessage::new(&ctx.chat_id, text.into()).quoting(&ctx.id);
        if let Err(e) = self.handle.send_message(message).await {
            warn!("Failed to send notice to {}: {}", ctx.chat_id, e);
        }
    }
}

fn resolve(registry: &CommandRegistry, name: &str) -> Result<Arc<Command>, DispatchError> {
    registry
        .get(name)
        .cloned()
        .ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))
}

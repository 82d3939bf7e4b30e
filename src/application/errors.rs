//! Application layer errors

use std::time::Duration;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors returned by command handlers and command definitions
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid command definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Bot(#[from] BotError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcomes of a dispatch that did not end in a successful handler run
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Permission denied for command {command}")]
    PermissionDenied { command: String },

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Command {command} ({plugin}) failed: {source}")]
    HandlerExecution {
        command: String,
        plugin: String,
        #[source]
        source: CommandError,
    },

    #[error("Command {command} ({plugin}) timed out after {after:?}")]
    HandlerTimeout {
        command: String,
        plugin: String,
        after: Duration,
    },

    #[error("Command {command} ({plugin}) panicked")]
    HandlerPanicked { command: String, plugin: String },
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Permission store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Plugin lifecycle errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin {plugin} failed to initialize: {reason}")]
    Init { plugin: String, reason: String },

    #[error("Plugin {plugin} panicked during init")]
    InitPanicked { plugin: String },

    #[error("Plugin {plugin} registered an invalid command: {source}")]
    Command {
        plugin: String,
        #[source]
        source: Box<CommandError>,
    },
}

impl PluginError {
    pub fn init(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        PluginError::Init {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type HandlerResult = Result<(), CommandError>;

//! Plugin trait definitions

use std::sync::Arc;

use crate::application::errors::PluginError;
use crate::application::handle::BotHandle;
use crate::application::messaging::middleware::Listener;
use crate::domain::entities::{Command, CommandRegistry};

/// Core plugin trait that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    /// Human-readable description
    fn description(&self) -> &str;

    /// Register commands and listeners. Called once per load or reload.
    fn init(&self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError>;

    /// Optional: release resources before a reload
    fn shutdown(&self) {}
}

/// What a plugin sees while initializing.
///
/// Registrations are staged and only become visible once `init` returned
/// `Ok`, so a plugin that fails halfway leaves nothing behind.
pub struct PluginContext<'a> {
    plugin: &'a str,
    handle: &'a BotHandle,
    staged: CommandRegistry,
}

impl<'a> PluginContext<'a> {
    pub fn new(plugin: &'a str, handle: &'a BotHandle) -> Self {
        Self {
            plugin,
            handle,
            staged: CommandRegistry::new(),
        }
    }

    pub fn handle(&self) -> &BotHandle {
        self.handle
    }

    pub fn register_command(&mut self, command: Command) -> Result<(), PluginError> {
        self.staged
            .register(command.with_plugin(self.plugin))
            .map(|_| ())
            .map_err(|source| PluginError::Command {
                plugin: self.plugin.to_string(),
                source: Box::new(source),
            })
    }

    pub fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.staged.add_listener(listener);
    }

    pub(crate) fn into_staged(self) -> CommandRegistry {
        self.staged
    }
}

/// A discovered plugin and whether it should be loaded
#[derive(Clone)]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub plugin: Arc<dyn Plugin>,
}

impl PluginRecord {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            enabled: true,
            plugin,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl std::fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("enabled", &self.enabled)
            .finish()
    }
}

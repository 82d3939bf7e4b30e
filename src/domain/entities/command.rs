use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::application::errors::{CommandError, HandlerResult};
use crate::application::handle::Invocation;
use crate::application::messaging::middleware::Listener;

static COMMAND_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").expect("static regex"));

pub const DEFAULT_CATEGORY: &str = "misc";

/// Boxed future returned by a command handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Command handler function type
pub type HandlerFn = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// Structural restrictions evaluated before a handler runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFlags {
    pub owner_only: bool,
    pub group_only: bool,
    pub private_only: bool,
    /// Only callers holding a grant (or the owner) may run it
    pub restricted: bool,
}

/// Represents a bot command
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub category: String,
    pub flags: CommandFlags,
    /// Plugin that registered the command
    pub plugin: String,
    handler: Option<HandlerFn>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            category: DEFAULT_CATEGORY.to_string(),
            flags: CommandFlags::default(),
            plugin: String::new(),
            handler: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.flags.owner_only = true;
        self
    }

    pub fn group_only(mut self) -> Self {
        self.flags.group_only = true;
        self
    }

    pub fn private_only(mut self) -> Self {
        self.flags.private_only = true;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.flags.restricted = true;
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = plugin.into();
        self
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |inv| Box::pin(handler(inv))));
        self
    }

    pub fn handler(&self) -> Option<&HandlerFn> {
        self.handler.as_ref()
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name == input_lower || self.aliases.iter().any(|a| *a == input_lower)
    }

    /// `<prefix>name args` line for help output
    pub fn usage_line(&self, prefix: &str) -> String {
        match &self.usage {
            Some(usage) => format!("{}{} {}", prefix, self.name, usage),
            None => format!("{}{}", prefix, self.name),
        }
    }

    /// Lowercase the name and aliases and check the command can be dispatched
    fn normalized(mut self) -> Result<Self, CommandError> {
        self.name = self.name.trim().to_ascii_lowercase();
        if !COMMAND_NAME.is_match(&self.name) {
            return Err(CommandError::InvalidDefinition(format!(
                "invalid command name '{}'",
                self.name
            )));
        }
        if self.handler.is_none() {
            return Err(CommandError::InvalidDefinition(format!(
                "command '{}' has no handler",
                self.name
            )));
        }

        let mut aliases = Vec::with_capacity(self.aliases.len());
        for alias in self.aliases.drain(..) {
            let alias = alias.trim().to_ascii_lowercase();
            if !COMMAND_NAME.is_match(&alias) {
                return Err(CommandError::InvalidDefinition(format!(
                    "invalid alias '{}' for '{}'",
                    alias, self.name
                )));
            }
            if alias != self.name && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        self.aliases = aliases;
        Ok(self)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("flags", &self.flags)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// Command registry for managing available commands.
///
/// Lookups are case-insensitive and resolve aliases. Listing keeps
/// registration order. Registering an existing name replaces the earlier
/// command in place and returns it.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    names: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
    listeners: Vec<Arc<dyn Listener>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<Option<Arc<Command>>, CommandError> {
        let command = Arc::new(command.normalized()?);

        let (idx, previous) = match self.names.get(&command.name) {
            Some(&idx) => {
                let previous = std::mem::replace(&mut self.commands[idx], command.clone());
                self.aliases.retain(|_, i| *i != idx);
                tracing::warn!(
                    "Command '{}' from plugin '{}' overrides the one from '{}'",
                    command.name,
                    command.plugin,
                    previous.plugin
                );
                (idx, Some(previous))
            }
            None => {
                self.commands.push(command.clone());
                let idx = self.commands.len() - 1;
                self.names.insert(command.name.clone(), idx);
                (idx, None)
            }
        };

        for alias in &command.aliases {
            if self.names.contains_key(alias) {
                tracing::warn!(
                    "Alias '{}' of '{}' shadowed by a command of the same name",
                    alias,
                    command.name
                );
                continue;
            }
            if let Some(other) = self.aliases.insert(alias.clone(), idx) {
                if other != idx {
                    tracing::warn!(
                        "Alias '{}' moved from '{}' to '{}'",
                        alias,
                        self.commands[other].name,
                        command.name
                    );
                }
            }
        }

        Ok(previous)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        let key = name.to_lowercase();
        self.names
            .get(&key)
            .or_else(|| self.aliases.get(&key))
            .map(|&idx| &self.commands[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Commands in registration order
    pub fn list(&self) -> &[Arc<Command>] {
        &self.commands
    }

    /// Category names in first-seen order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for cmd in &self.commands {
            if !seen.contains(&cmd.category.as_str()) {
                seen.push(&cmd.category);
            }
        }
        seen
    }

    pub fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> &[Arc<dyn Listener>] {
        &self.listeners
    }

    /// Fold another registry in, registration order preserved
    pub fn merge(&mut self, other: CommandRegistry) -> Result<(), CommandError> {
        for cmd in other.commands {
            self.register((*cmd).clone())?;
        }
        self.listeners.extend(other.listeners);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The live registry seen by the dispatcher.
///
/// Readers get an immutable snapshot; writers publish a complete replacement
/// in one atomic store, so a lookup never observes a half-built table.
pub struct SharedRegistry {
    current: ArcSwap<CommandRegistry>,
    /// Serializes writers; readers never take it
    write: Mutex<()>,
}

impl SharedRegistry {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
            write: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        self.current.load_full()
    }

    pub fn publish(&self, registry: CommandRegistry) {
        let _guard = self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.current.store(Arc::new(registry));
    }

    /// Register one command on top of the current snapshot
    pub fn register(&self, command: Command) -> Result<Option<Arc<Command>>, CommandError> {
        let _guard = self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (*self.current.load_full()).clone();
        let previous = next.register(command)?;
        self.current.store(Arc::new(next));
        Ok(previous)
    }

    pub fn unregister_all(&self) {
        self.publish(CommandRegistry::new());
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(CommandRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Command {
        Command::new(name).with_handler(|_inv| async { Ok(()) })
    }

    #[test]
    fn get_returns_registered_command() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                noop("sticker")
                    .with_description("Make a sticker")
                    .with_usage("<image>")
                    .with_category("media")
                    .with_plugin("stickers"),
            )
            .unwrap();

        let cmd = registry.get("sticker").unwrap();
        assert_eq!(cmd.description.as_deref(), Some("Make a sticker"));
        assert_eq!(cmd.usage.as_deref(), Some("<image>"));
        assert_eq!(cmd.category, "media");
        assert_eq!(cmd.plugin, "stickers");
    }

    #[test]
    fn lookup_is_case_insensitive_and_resolves_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("Help").with_aliases(["MENU", "h"])).unwrap();

        assert_eq!(registry.get("HELP").unwrap().name, "help");
        assert_eq!(registry.get("menu").unwrap().name, "help");
        assert_eq!(registry.get("H").unwrap().name, "help");
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn duplicate_name_overrides_in_place() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("a").with_plugin("first")).unwrap();
        registry.register(noop("b")).unwrap();

        for _ in 0..2 {
            let previous = registry.register(noop("a").with_plugin("second")).unwrap();
            assert!(previous.is_some());
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.get("a").unwrap().plugin, "second");
            assert_eq!(registry.list()[0].name, "a");
        }
    }

    #[test]
    fn override_drops_stale_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("sticker").with_aliases(["s"])).unwrap();
        registry.register(noop("sticker").with_aliases(["stk"])).unwrap();

        assert!(registry.get("s").is_none());
        assert_eq!(registry.get("stk").unwrap().name, "sticker");
    }

    #[test]
    fn command_names_win_over_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("tts").with_aliases(["say"])).unwrap();
        registry.register(noop("say")).unwrap();

        assert_eq!(registry.get("say").unwrap().name, "say");
        assert_eq!(registry.get("tts").unwrap().name, "tts");
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut registry = CommandRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(noop(name)).unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn rejects_commands_without_handler_or_bad_name() {
        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.register(Command::new("ping")),
            Err(CommandError::InvalidDefinition(_))
        ));
        assert!(registry.register(noop("two words")).is_err());
        assert!(registry.register(noop("")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_registry_swaps_whole_snapshots() {
        let shared = SharedRegistry::default();
        shared.register(noop("ping")).unwrap();

        let before = shared.snapshot();
        let mut next = CommandRegistry::new();
        next.register(noop("pong")).unwrap();
        shared.publish(next);

        assert!(before.contains("ping"));
        assert!(!shared.snapshot().contains("ping"));
        assert!(shared.snapshot().contains("pong"));

        shared.unregister_all();
        assert!(shared.is_empty());
        assert!(before.contains("ping"));
    }
}

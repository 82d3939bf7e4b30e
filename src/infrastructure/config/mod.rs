//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::messaging::DispatchPolicy;
use crate::domain::entities::Jid;

/// Bot configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub dispatch: DispatchConfig,
    pub rate_limit: RateLimitConfig,
    pub permissions: PermissionsConfig,
    pub plugins: PluginConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
    /// Phone number or JID of the owner
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatchConfig {
    /// Answer unknown commands with a hint instead of staying silent
    pub reply_unknown: bool,
    pub notify_denied: bool,
    pub reply_on_error: bool,
    pub handler_timeout_secs: u64,
    /// Treat messages sent from the bot's own account as commands
    pub respond_to_self: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PermissionsConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub console: ConsoleConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Identity console lines are attributed to; defaults to the owner
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BridgeConfig {
    pub enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "wabot".to_string(),
            prefix: ".".to_string(),
            owner: "6281234567890".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            reply_unknown: false,
            notify_denied: true,
            reply_on_error: true,
            handler_timeout_secs: 60,
            respond_to_self: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_seconds: 60,
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: PathBuf::from("data/permissions.json"),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config {}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Load `path` if it exists, fall back to defaults otherwise, then apply
    /// environment overrides and validate.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Config::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(prefix) = var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }
        if let Some(owner) = var("BOT_OWNER") {
            self.bot.owner = owner;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "bot.prefix must not contain whitespace".to_string(),
            ));
        }
        if self.bot.owner.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.owner".to_string()));
        }
        self.owner_jid()?;
        if self.dispatch.handler_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "dispatch.handler-timeout-secs must be positive".to_string(),
            ));
        }
        if self.rate_limit.enabled && (self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0) {
            return Err(ConfigError::InvalidValue(
                "rate-limit needs positive max-requests and window-seconds".to_string(),
            ));
        }
        Ok(())
    }

    /// Owner as a bare JID
    pub fn owner_jid(&self) -> Result<Jid, ConfigError> {
        Jid::resolve(&self.bot.owner)
            .filter(|j| j.user.chars().any(|c| c.is_ascii_digit()))
            .map(|j| Jid::new(j.user, j.server))
            .ok_or_else(|| ConfigError::InvalidValue(format!("bot.owner '{}' is not a phone number or JID", self.bot.owner)))
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            reply_unknown: self.dispatch.reply_unknown,
            notify_denied: self.dispatch.notify_denied,
            reply_on_error: self.dispatch.reply_on_error,
            handler_timeout: Duration::from_secs(self.dispatch.handler_timeout_secs),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::Parse(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = Config::from_yaml(
            r#"
bot:
  owner: "+62 811-0000-0000"
dispatch:
  reply-unknown: true
  handler-timeout-secs: 5
permissions:
  backend: sqlite
  path: /tmp/grants.db
plugins:
  disabled: [general]
"#,
        )
        .unwrap();

        assert_eq!(config.bot.prefix, ".");
        assert_eq!(config.owner_jid().unwrap().to_string(), "6281100000000@s.whatsapp.net");
        assert!(config.dispatch.reply_unknown);
        assert!(config.dispatch.notify_denied);
        assert_eq!(config.permissions.backend, StoreBackend::Sqlite);
        assert_eq!(config.plugins.disabled, ["general"]);

        let policy = config.dispatch_policy();
        assert_eq!(policy.handler_timeout, Duration::from_secs(5));
        assert!(policy.reply_unknown);
    }

    #[test]
    fn default_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("handler-timeout-secs"));
        assert_eq!(Config::from_yaml(&yaml).unwrap(), Config::default());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.bot.prefix = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bot.owner = "owner".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = Config::default();
        config.dispatch.handler_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_prefix_and_owner() {
        let env: HashMap<&str, &str> = [("BOT_PREFIX", "!"), ("BOT_OWNER", "6281200000000@c.us")].into();
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.owner_jid().unwrap().to_string(), "6281200000000@s.whatsapp.net");
    }

    #[test]
    fn owner_device_suffix_is_dropped() {
        let mut config = Config::default();
        config.bot.owner = "6281100000000:12@s.whatsapp.net".to_string();
        assert_eq!(config.owner_jid().unwrap().to_string(), "6281100000000@s.whatsapp.net");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.bot.name = "kedai".to_string();
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap().bot.name, "kedai");
    }
}

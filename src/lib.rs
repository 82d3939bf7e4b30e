//! wabot - command dispatch core for a WhatsApp bot
//!
//! Inbound session events are normalized, matched against the command
//! registry, checked against the permission rules and handed to plugin
//! handlers through a [`BotHandle`](application::handle::BotHandle).

pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

#[cfg(test)]
mod test_support;

pub use app::App;
pub use application::errors::{BotError, CommandError, DispatchError, HandlerResult};
pub use application::handle::{BotHandle, Invocation};
pub use domain::entities::Command;
pub use plugins::{Plugin, PluginContext, PluginRecord};

//! Plugin system for wabot
//!
//! Plugins are compiled in and handed to the loader at startup. Each one
//! registers commands and listeners through a [`PluginContext`].

pub mod general;
pub mod manager;
pub mod owner;
pub mod trait_def;

use std::sync::Arc;

pub use manager::{LoadReport, PluginFailure, PluginLoader};
pub use trait_def::{Plugin, PluginContext, PluginRecord};

/// Plugins shipped with the binary, in load order
pub fn builtin() -> Vec<PluginRecord> {
    vec![
        PluginRecord::new(Arc::new(general::GeneralPlugin)),
        PluginRecord::new(Arc::new(owner::OwnerPlugin)),
    ]
}

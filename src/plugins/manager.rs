//! Plugin loader - initializes plugins and publishes their commands

use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::errors::PluginError;
use crate::application::handle::BotHandle;
use crate::domain::entities::CommandRegistry;
use crate::plugins::trait_def::{PluginContext, PluginRecord};

/// Outcome of one load or reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<PluginFailure>,
    pub skipped: Vec<String>,
    pub commands: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFailure {
    pub name: String,
    pub error: String,
}

/// Owns the plugin list and rebuilds the registry from it
pub struct PluginLoader {
    sources: Vec<PluginRecord>,
    load_lock: Mutex<()>,
    last_report: ArcSwapOption<LoadReport>,
}

impl PluginLoader {
    pub fn new(sources: Vec<PluginRecord>) -> Self {
        Self {
            sources,
            load_lock: Mutex::new(()),
            last_report: ArcSwapOption::empty(),
        }
    }

    /// Mark plugins listed by name as disabled
    pub fn with_disabled(mut self, disabled: &[String]) -> Self {
        for record in &mut self.sources {
            if disabled.iter().any(|d| d.eq_ignore_ascii_case(&record.name)) {
                record.enabled = false;
            }
        }
        self
    }

    pub fn last_report(&self) -> Option<Arc<LoadReport>> {
        self.last_report.load_full()
    }

    /// Initialize every enabled plugin and publish the resulting registry
    pub async fn load_all(&self, handle: &BotHandle) -> LoadReport {
        let _guard = self.load_lock.lock().await;
        self.build_and_publish(handle)
    }

    /// Shut plugins down and load them again. The old registry stays live
    /// until the new one is complete.
    pub async fn reload(&self, handle: &BotHandle) -> LoadReport {
        let _guard = self.load_lock.lock().await;
        info!("Reloading {} plugins", self.sources.len());

        for record in self.sources.iter().filter(|r| r.enabled) {
            let plugin = &record.plugin;
            if panic::catch_unwind(AssertUnwindSafe(|| plugin.shutdown())).is_err() {
                warn!("Plugin {} panicked during shutdown", record.name);
            }
        }

        self.build_and_publish(handle)
    }

    fn build_and_publish(&self, handle: &BotHandle) -> LoadReport {
        let mut registry = CommandRegistry::new();
        let mut report = LoadReport::default();

        for record in &self.sources {
            if !record.enabled {
                info!("Skipping disabled plugin: {}", record.name);
                report.skipped.push(record.name.clone());
                continue;
            }

            match init_plugin(record, handle) {
                Ok(staged) => {
                    let count = staged.len();
                    match registry.merge(staged) {
                        Ok(()) => {
                            info!("Loaded plugin: {} v{} ({} commands)", record.name, record.version, count);
                            report.succeeded.push(record.name.clone());
                        }
                        Err(e) => {
                            error!("Failed to merge plugin {}: {}", record.name, e);
                            report.failed.push(PluginFailure {
                                name: record.name.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to load plugin {}: {}", record.name, e);
                    report.failed.push(PluginFailure {
                        name: record.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.commands = registry.len();
        handle.shared_registry().publish(registry);
        info!(
            "Plugins loaded: {} ok, {} failed, {} skipped, {} commands",
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len(),
            report.commands
        );

        self.last_report.store(Some(Arc::new(report.clone())));
        report
    }
}

fn init_plugin(record: &PluginRecord, handle: &BotHandle) -> Result<CommandRegistry, PluginError> {
    let mut ctx = PluginContext::new(&record.name, handle);
    let plugin = &record.plugin;

    match panic::catch_unwind(AssertUnwindSafe(|| plugin.init(&mut ctx))) {
        Ok(Ok(())) => Ok(ctx.into_staged()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(PluginError::InitPanicked {
            plugin: record.name.clone(),
        }),
    }
}

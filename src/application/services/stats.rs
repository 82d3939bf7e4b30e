//! Process-wide dispatch counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct Stats {
    messages_received: AtomicU64,
    commands_executed: AtomicU64,
    errors: AtomicU64,
    denied: AtomicU64,
    unknown_commands: AtomicU64,
    rate_limited: AtomicU64,
    started_at: DateTime<Utc>,
}

/// Read-only copy of the counters for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub commands_executed: u64,
    pub errors: u64,
    pub denied: u64,
    pub unknown_commands: u64,
    pub rate_limited: u64,
    pub commands_registered: usize,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            unknown_commands: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown(&self) {
        self.unknown_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, commands_registered: usize) -> StatsSnapshot {
        let now = Utc::now();
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            commands_registered,
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds(),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// `1d 2h 3m` style uptime
pub fn format_uptime(secs: i64) -> String {
    let secs = secs.max(0);
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);
    match (days, hours) {
        (0, 0) => format!("{}m {}s", minutes, secs % 60),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h {}m", days, hours, minutes),
    }
}

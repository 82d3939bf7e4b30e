//! Passive listeners and per-sender rate limiting

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::application::errors::{DispatchError, HandlerResult};
use crate::application::handle::BotHandle;
use crate::domain::entities::MessageContext;

/// Receives every relevant message that is not a command
/// (auto-replies, anti-link guards, media auto-conversion).
#[async_trait]
pub trait Listener: Send + Sync {
    fn name(&self) -> &str;

    async fn on_message(&self, bot: BotHandle, message: Arc<MessageContext>) -> HandlerResult;
}

/// Sliding-window limiter keyed by sender
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), DispatchError> {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();

        // Get or create entry
        let times = requests.entry(key.to_string()).or_default();

        // Remove old requests outside the window
        times.retain(|&t| now.duration_since(t) < self.window);

        if times.len() >= self.max_requests as usize {
            let retry_after = times
                .first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);

            return Err(DispatchError::RateLimited { retry_after });
        }

        times.push(now);
        Ok(())
    }

    /// Drop keys whose whole window has expired
    pub fn prune(&self) {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        requests.retain(|_, times| times.iter().any(|&t| now.duration_since(t) < self.window));
    }
}

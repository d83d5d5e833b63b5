//! Fixed-delay reconnect budget

use std::time::Duration;

use crate::config::ReconnectConfig;

#[derive(Debug, Clone)]
pub(crate) struct ReconnectState {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectState {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: config.max_attempts,
            delay: config.delay(),
        }
    }

    /// Consume one attempt and return the delay to wait, or `None` when the
    /// budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

//! Runtime configuration for the dispatcher.
//!
//! A host application normally builds a [`Config`] directly; `from_env`
//! layers `WIRELINE_*` environment overrides on top of the defaults for
//! deployments that tune the layer without code changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_POLL_INTERVAL;

/// Tunables for a [`crate::Dispatcher`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Interval in milliseconds between connection-state polls while a
    /// call waits for the link to become ready.
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Build a configuration from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// The poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(poll_interval) = std::env::var("WIRELINE_POLL_INTERVAL_MS") {
            if let Ok(interval) = poll_interval.parse::<u64>() {
                self.poll_interval_ms = interval;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_env_override_applies() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("WIRELINE_POLL_INTERVAL_MS", "25");
        let config = Config::from_env();
        std::env::remove_var("WIRELINE_POLL_INTERVAL_MS");
        assert_eq!(config.poll_interval_ms, 25);
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("WIRELINE_POLL_INTERVAL_MS", "not-a-number");
        let config = Config::from_env();
        std::env::remove_var("WIRELINE_POLL_INTERVAL_MS");
        assert_eq!(config.poll_interval_ms, 10);
    }
}

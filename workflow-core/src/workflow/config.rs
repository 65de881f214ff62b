//! Session configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Tunables for one managed session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pause between two scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Set the tick interval. Sub-millisecond parts are dropped and
    /// intervals too long for `u64` milliseconds saturate.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

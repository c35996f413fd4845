//! Timing knobs for the central.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a queued operation may wait for its completion event.
    pub operation_timeout_ms: u64,
    /// Interval at which the queue checks for a completion.
    pub poll_interval_ms: u64,
    /// Delay between registering the prepare listener and issuing the build.
    pub prepare_delay_ms: u64,
    /// How long to wait for the prepare event after the build call.
    pub prepare_timeout_ms: u64,
    /// How long to wait for the transport's connect callback.
    pub connect_timeout_ms: u64,
    /// Request pairing as part of the profile build.
    pub pair_profile: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            operation_timeout_ms: 5000,
            poll_interval_ms: 50,
            prepare_delay_ms: 100,
            prepare_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            pair_profile: true,
        }
    }
}

impl Config {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // a zero interval would spin the executor
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn prepare_delay(&self) -> Duration {
        Duration::from_millis(self.prepare_delay_ms)
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

//! Engine configuration

use crate::backoff::ExponentialBackoff;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often the activation scanner polls for eligible robots (ms)
    pub scan_interval_ms: u64,
    /// First cool-down after a feed failure (ms)
    pub reconnect_base_ms: u64,
    /// Longest cool-down between feed reconnects (ms)
    pub reconnect_max_ms: u64,
    /// Jitter applied to each cool-down, as a fraction of the delay
    pub reconnect_jitter: f64,
    /// Capacity of the channel carrying new-robot notifications to the scanner
    pub track_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 3_000,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 60_000,
            reconnect_jitter: 0.1,
            track_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "scan_interval_ms must be positive".to_string(),
            ));
        }
        if self.reconnect_max_ms < self.reconnect_base_ms {
            return Err(EngineError::InvalidConfig(format!(
                "reconnect_max_ms ({}) is below reconnect_base_ms ({})",
                self.reconnect_max_ms, self.reconnect_base_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(EngineError::InvalidConfig(format!(
                "reconnect_jitter must be within [0, 1], got {}",
                self.reconnect_jitter
            )));
        }
        if self.track_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "track_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Fresh backoff state for one ticker's feed
    pub fn reconnect_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect_base_ms),
            Duration::from_millis(self.reconnect_max_ms),
            self.reconnect_jitter,
        )
    }
}

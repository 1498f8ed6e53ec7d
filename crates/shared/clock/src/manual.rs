use chrono::{Duration, Utc};
use robotrader_core::Timestamp;
use robotrader_ports::Clock;
use std::sync::{Arc, RwLock};

/// Fixed clock for deterministic tests
///
/// Time never moves on its own; it only changes through [`advance`] or
/// [`set_time`]. Clones share the same underlying time.
///
/// [`advance`]: ManualClock::advance
/// [`set_time`]: ManualClock::set_time
#[derive(Clone)]
pub struct ManualClock {
    current_time: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            current_time: Arc::new(RwLock::new(initial_time)),
        }
    }

    /// Freeze the clock at the current wall time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move time forward (or backward, for a negative duration)
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current += duration;
    }

    /// Jump to an explicit time
    pub fn set_time(&self, time: Timestamp) {
        let mut current = self
            .current_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self
            .current_time
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

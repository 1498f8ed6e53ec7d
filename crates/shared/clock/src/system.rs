use chrono::Utc;
use robotrader_core::Timestamp;
use robotrader_ports::Clock;

/// Wall-clock UTC time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

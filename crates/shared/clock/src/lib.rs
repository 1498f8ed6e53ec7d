//! Robotrader Clock Infrastructure
//!
//! Two implementations of the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock UTC time for production
//! - [`ManualClock`]: frozen time that only moves when told to, for tests
//!
//! ## Usage
//!
//! ```ignore
//! use robotrader_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_now();
//! let before = clock.now();
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now() - before, Duration::minutes(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use robotrader_ports::Clock;

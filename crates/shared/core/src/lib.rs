//! Robotrader Core Domain
//!
//! Pure domain types for the robotrader execution engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{Action, Quote, Robot, RobotId, TradeMode, UserId};
pub use values::{Price, Ticker, Timestamp};

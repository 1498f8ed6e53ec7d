//! Persistence and notification adapters

pub mod memory;
pub mod notify;

pub use memory::InMemoryRobotStore;
pub use notify::{BroadcastNotifier, LogNotifier};

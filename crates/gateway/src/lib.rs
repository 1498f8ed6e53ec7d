//! Robotrader Gateway
//!
//! In-process implementations of the engine's collaborator ports:
//! - Robot persistence held in memory, forwarding every write to a notifier
//! - Per-ticker quote channels standing in for a streaming price service
//! - Change notification fanned out to any number of listeners
//!
//! ## Architecture
//!
//! ```text
//!  quote source ──publish──► ChannelPriceFeed ──QuoteStream──► engine
//!                                                               │
//!                                               update_robot    ▼
//!  listeners ◄──broadcast── BroadcastNotifier ◄── InMemoryRobotStore
//! ```

pub mod adapters;
pub mod transport;

// Re-export commonly used types
pub use adapters::{BroadcastNotifier, InMemoryRobotStore, LogNotifier};
pub use transport::{ChannelPriceFeed, ChannelQuoteStream};

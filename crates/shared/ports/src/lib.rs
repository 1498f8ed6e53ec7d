//! Robotrader Ports
//!
//! Port definitions (traits) for the robotrader execution engine.
//! These define the boundaries between the engine and the collaborators
//! it drives: persistence, the price feed, and downstream notification.

mod clock;
mod error;
mod feed;
mod notify;
mod store;

pub use clock::Clock;
pub use error::{FeedError, FeedResult, StoreError, StoreResult};
pub use feed::{PriceFeed, QuoteStream};
pub use notify::RobotNotifier;
pub use store::RobotStore;

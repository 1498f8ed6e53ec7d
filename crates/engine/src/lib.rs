//! Robotrader Engine - trading execution for user-defined robots
//!
//! Periodically discovers robots eligible to run, streams prices per ticker,
//! fires buy/sell fills when thresholds are crossed, persists every fill,
//! and retires robots whose run is over.
//!
//! ## Architecture
//!
//! ```text
//!          ┌────────────────────┐
//!          │ Activation Scanner │◄──── EngineHandle::track
//!          └─────────┬──────────┘
//!                    │ upsert + claim feed (one lock)
//!                    ▼
//!          ┌────────────────────┐
//!          │  Trader Registry   │  ticker → robot id → Trader
//!          └─────────┬──────────┘
//!                    │ fan-out per quote
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   Subscription Subscription Subscription   (one task per ticker)
//!        │           │           │
//!        └──── RobotStore::update_robot ───► notifier
//! ```

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scanner;
pub mod subscription;
pub mod trader;

// Re-export main types
pub use backoff::ExponentialBackoff;
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle};
pub use error::{EngineError, Result};
pub use registry::{
    FeedState, Generation, Retain, TraderBooks, TraderRegistry, TraderSnapshot, Upsert,
};
pub use scanner::Scanner;
pub use subscription::{EngineContext, Subscription, SubscriptionExit};
pub use trader::Trader;

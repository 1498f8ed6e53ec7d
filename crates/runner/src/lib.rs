//! Robotrader Runner - single-process robotrader
//!
//! Runs the execution engine against in-process collaborators:
//!
//! - **Bootstrap**: seed robots into the store, report robot changes
//! - **Price Walk**: simulated quote source, one task per ticker
//! - **Session**: full orchestration and ordered shutdown
//!
//! ## Architecture
//!
//! ```text
//!   PriceWalk (per ticker) ──publish──► ChannelPriceFeed
//!                                             │
//!                                             ▼
//!   seed robots ──► InMemoryRobotStore ◄──► Engine
//!                          │
//!                          ▼
//!                  BroadcastNotifier ──► change report (log)
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod price_walk;
pub mod session;

// Re-export main types
pub use bootstrap::{report_changes, seed_robots};
pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use price_walk::PriceWalk;
pub use session::{SessionReport, run_session};

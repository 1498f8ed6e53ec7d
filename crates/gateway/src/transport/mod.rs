//! Price feed transport
//!
//! Quotes travel over tokio channels within one process. The engine only
//! sees the `PriceFeed`/`QuoteStream` ports, so a networked feed can replace
//! this without touching it.

pub mod channel;

pub use channel::{ChannelPriceFeed, ChannelQuoteStream};

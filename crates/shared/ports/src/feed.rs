use async_trait::async_trait;
use robotrader_core::Quote;

use crate::error::FeedResult;

/// A live sequence of quotes for one ticker
#[async_trait]
pub trait QuoteStream: Send {
    /// Wait for the next quote
    ///
    /// `Ok(None)` signals a clean end of stream. Implementations must be
    /// cancel-safe: dropping the returned future loses no quote.
    async fn next_quote(&mut self) -> FeedResult<Option<Quote>>;
}

/// Port for the price feed source
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Open a quote stream for `ticker`
    async fn subscribe(&self, ticker: &str) -> FeedResult<Box<dyn QuoteStream>>;
}

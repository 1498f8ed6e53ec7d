//! Tokio channel-based price feed for single-process mode
//!
//! Each ticker gets a broadcast channel on first use. Every subscriber sees
//! every quote published after it subscribed; a subscriber that falls
//! behind skips what it missed rather than blocking the publisher.

use async_trait::async_trait;
use log::{debug, warn};
use robotrader_core::{Quote, Ticker};
use robotrader_ports::{FeedError, FeedResult, PriceFeed, QuoteStream};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

type Message = FeedResult<Quote>;

/// Channel-based price feed with one broadcast channel per ticker
pub struct ChannelPriceFeed {
    channels: Mutex<HashMap<Ticker, broadcast::Sender<Message>>>,
    /// Tickers whose `subscribe` currently fails
    refused: Mutex<HashSet<Ticker>>,
    capacity: usize,
}

impl ChannelPriceFeed {
    /// Create a feed whose per-ticker channels buffer `capacity` quotes
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashSet::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a quote to every current subscriber of `ticker`
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, ticker: &str, quote: Quote) -> usize {
        self.send(ticker, Ok(quote))
    }

    /// Deliver a stream error to every current subscriber of `ticker`
    pub fn fail_stream(&self, ticker: &str, reason: &str) -> usize {
        self.send(ticker, Err(FeedError::Stream(reason.to_string())))
    }

    /// End the stream for current subscribers of `ticker`
    ///
    /// They drain buffered quotes, then see end-of-stream. A later
    /// `subscribe` opens a fresh channel.
    pub fn close(&self, ticker: &str) {
        if lock(&self.channels).remove(ticker).is_some() {
            debug!("[{}] Feed channel closed", ticker);
        }
    }

    /// Make `subscribe` fail for `ticker` until switched back
    pub fn refuse_subscriptions(&self, ticker: &str, refuse: bool) {
        let mut refused = lock(&self.refused);
        if refuse {
            refused.insert(ticker.to_string());
        } else {
            refused.remove(ticker);
        }
    }

    pub fn subscriber_count(&self, ticker: &str) -> usize {
        lock(&self.channels)
            .get(ticker)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn send(&self, ticker: &str, message: Message) -> usize {
        match lock(&self.channels).get(ticker) {
            // Err only means nobody is listening right now
            Some(tx) => tx.send(message).unwrap_or(0),
            None => 0,
        }
    }
}

impl Default for ChannelPriceFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl PriceFeed for ChannelPriceFeed {
    async fn subscribe(&self, ticker: &str) -> FeedResult<Box<dyn QuoteStream>> {
        if lock(&self.refused).contains(ticker) {
            return Err(FeedError::Connection(format!(
                "subscription to {} refused",
                ticker
            )));
        }

        let rx = lock(&self.channels)
            .entry(ticker.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!("[{}] New feed subscriber", ticker);
        Ok(Box::new(ChannelQuoteStream {
            ticker: ticker.to_string(),
            rx,
        }))
    }
}

/// Quote stream over one ticker's broadcast channel
pub struct ChannelQuoteStream {
    ticker: Ticker,
    rx: broadcast::Receiver<Message>,
}

#[async_trait]
impl QuoteStream for ChannelQuoteStream {
    async fn next_quote(&mut self) -> FeedResult<Option<Quote>> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return message.map(Some),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[{}] Lagged {} quotes", self.ticker, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Nothing here can leave the maps half-updated
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

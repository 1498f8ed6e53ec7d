//! Ticker Subscription - one price-feed consumer per ticker
//!
//! Lifecycle: `Starting → Streaming → Closed`.
//!
//! Each received quote is fanned out to every trader of the ticker as one
//! unit: the registry lock is held only while deciding and applying fills
//! in memory, the resulting robot rows are written after the lock is
//! released, and a second short lock removes finished or failed traders.
//! The shutdown signal is only checked between quotes, never in the middle
//! of a fan-out.

use crate::registry::{Generation, Retain, TraderRegistry};
use log::{debug, info, warn};
use robotrader_core::{Action, Quote, Robot, RobotId, Ticker};
use robotrader_ports::{Clock, FeedError, PriceFeed, QuoteStream, RobotStore};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a subscription task returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionExit {
    /// The engine is shutting down
    Cancelled,
    /// The last trader of the ticker was removed
    Drained,
    /// The feed slot now belongs to a newer subscription, or the ticker's
    /// book is gone
    Superseded,
    /// The feed could not be opened; the slot is cooling down
    OpenFailed(FeedError),
    /// The feed ended cleanly; the slot is cooling down
    EndOfStream,
    /// The feed failed mid-stream; the slot is cooling down
    StreamFailed(FeedError),
}

/// Outcome of handling one quote
enum Step {
    Continue,
    Stop(SubscriptionExit),
}

/// Collaborators shared by the scanner and all subscriptions
#[derive(Clone)]
pub struct EngineContext {
    pub registry: Arc<TraderRegistry>,
    pub store: Arc<dyn RobotStore>,
    pub feed: Arc<dyn PriceFeed>,
    pub clock: Arc<dyn Clock>,
}

pub struct Subscription {
    ticker: Ticker,
    generation: Generation,
    ctx: EngineContext,
    shutdown: watch::Receiver<bool>,
}

impl Subscription {
    pub fn new(
        ticker: Ticker,
        generation: Generation,
        ctx: EngineContext,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ticker,
            generation,
            ctx,
            shutdown,
        }
    }

    /// Run until the feed closes, the ticker drains, or shutdown
    pub async fn run(mut self) -> SubscriptionExit {
        let exit = match self.open().await {
            Ok(Some(stream)) => self.stream(stream).await,
            Ok(None) => SubscriptionExit::Cancelled,
            Err(e) => {
                warn!("[{}] Can't start listening to prices: {}", self.ticker, e);
                self.release().await;
                SubscriptionExit::OpenFailed(e)
            }
        };

        info!(
            "[{}] Subscription {} closed: {:?}",
            self.ticker, self.generation, exit
        );
        exit
    }

    /// `Starting`: open the stream, unless shutdown arrives first
    async fn open(&mut self) -> Result<Option<Box<dyn QuoteStream>>, FeedError> {
        if self.is_shutdown() {
            return Ok(None);
        }

        // Only the engine writes the signal, and it only ever writes `true`
        let feed = self.ctx.feed.clone();
        let stream = tokio::select! {
            biased;
            _ = self.shutdown.changed() => return Ok(None),
            result = feed.subscribe(&self.ticker) => result?,
        };

        self.ctx
            .registry
            .lock()
            .await
            .feed_opened(&self.ticker, self.generation);
        info!(
            "[{}] Subscription {} streaming",
            self.ticker, self.generation
        );
        Ok(Some(stream))
    }

    /// `Streaming`: apply quotes in arrival order
    async fn stream(&mut self, mut stream: Box<dyn QuoteStream>) -> SubscriptionExit {
        loop {
            if self.is_shutdown() {
                return SubscriptionExit::Cancelled;
            }

            let next = tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    // Sender gone means the engine handle was dropped
                    if changed.is_err() {
                        return SubscriptionExit::Cancelled;
                    }
                    continue;
                }
                next = stream.next_quote() => next,
            };

            match next {
                Ok(Some(quote)) => {
                    if let Step::Stop(exit) = self.handle_quote(quote).await {
                        return exit;
                    }
                }
                Ok(None) => {
                    info!("[{}] Price stream ended", self.ticker);
                    self.release().await;
                    return SubscriptionExit::EndOfStream;
                }
                Err(e) => {
                    warn!("[{}] Can't receive from price stream: {}", self.ticker, e);
                    self.release().await;
                    return SubscriptionExit::StreamFailed(e);
                }
            }
        }
    }

    /// Fan one quote out to every trader of the ticker
    async fn handle_quote(&self, quote: Quote) -> Step {
        let now = self.ctx.clock.now();
        let mut fills: Vec<(Action, Robot)> = Vec::new();

        let mut finished = {
            let mut books = self.ctx.registry.lock().await;
            if !books.owns_feed(&self.ticker, self.generation) {
                return Step::Stop(SubscriptionExit::Superseded);
            }

            books.for_each_trader(&self.ticker, |trader| {
                if trader.is_finished(now) {
                    return Retain::Remove;
                }
                if let Some(action) = trader.on_quote(&quote) {
                    fills.push((action, trader.robot().clone()));
                }
                Retain::Keep
            })
        };

        for (action, robot) in &fills {
            match self.ctx.store.update_robot(robot).await {
                Ok(()) => debug!(
                    "[{}] Robot {} {:?}, fact_yield={} deals={}",
                    self.ticker, robot.robot_id, action, robot.fact_yield, robot.deals_count
                ),
                Err(e) => {
                    // The in-memory trader already moved on; retiring it is
                    // the only way to stop it trading on unpersisted state.
                    warn!(
                        "[{}] Can't persist {:?} for robot {}: {}",
                        self.ticker, action, robot.robot_id, e
                    );
                    finished.push(robot.robot_id);
                }
            }
        }

        if finished.is_empty() {
            return Step::Continue;
        }
        self.retire(finished).await
    }

    async fn retire(&self, mut ids: Vec<RobotId>) -> Step {
        ids.sort_unstable();
        ids.dedup();

        let mut books = self.ctx.registry.lock().await;
        if !books.owns_feed(&self.ticker, self.generation) {
            return Step::Stop(SubscriptionExit::Superseded);
        }

        let remaining = books.remove(&self.ticker, &ids);
        info!(
            "[{}] Retired robots {:?}, {} still trading",
            self.ticker, ids, remaining
        );

        if remaining == 0 {
            Step::Stop(SubscriptionExit::Drained)
        } else {
            Step::Continue
        }
    }

    /// Hand the feed slot back so a later scan can retry
    async fn release(&self) {
        let delay = self.ctx.registry.lock().await.release_feed(
            &self.ticker,
            self.generation,
            Instant::now(),
        );
        if let Some(delay) = delay {
            info!(
                "[{}] Retrying feed in {:?} at the earliest",
                self.ticker, delay
            );
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

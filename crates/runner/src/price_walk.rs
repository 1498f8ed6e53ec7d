//! Price Walk - simulated quote source for one ticker
//!
//! The mid price follows a bounded random walk; every step yields a quote
//! with the buy price half a spread above the mid and the sell price half a
//! spread below it.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use robotrader_core::{Price, Quote, Ticker};
use robotrader_gateway::ChannelPriceFeed;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Resolution of one random step, in ten-thousandths
const STEPS: i64 = 10_000;

/// Quotes never drop below one cent
const FLOOR: Price = dec!(0.01);

pub struct PriceWalk {
    ticker: Ticker,
    mid: Price,
    volatility: Decimal,
    spread: Decimal,
    rng: StdRng,
}

impl PriceWalk {
    pub fn new(ticker: impl Into<Ticker>, mid: Price, volatility: Decimal, spread: Decimal) -> Self {
        Self::with_rng(ticker, mid, volatility, spread, StdRng::from_entropy())
    }

    /// Reproducible walk
    pub fn with_seed(
        ticker: impl Into<Ticker>,
        mid: Price,
        volatility: Decimal,
        spread: Decimal,
        seed: u64,
    ) -> Self {
        Self::with_rng(ticker, mid, volatility, spread, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        ticker: impl Into<Ticker>,
        mid: Price,
        volatility: Decimal,
        spread: Decimal,
        rng: StdRng,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            mid,
            volatility,
            spread,
            rng,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn mid(&self) -> Price {
        self.mid
    }

    /// Move the mid one step and quote around it
    pub fn next_quote(&mut self) -> Quote {
        let step = Decimal::new(self.rng.gen_range(-STEPS..=STEPS), 4);
        self.mid = (self.mid + self.mid * self.volatility * step)
            .round_dp(4)
            .max(FLOOR);

        let half_spread = self.mid * self.spread / dec!(2);
        Quote::new(
            (self.mid + half_spread).round_dp(2).max(FLOOR),
            (self.mid - half_spread).round_dp(2).max(FLOOR),
        )
    }

    /// Publish one quote per `interval` until shutdown
    pub async fn run(
        mut self,
        feed: Arc<ChannelPriceFeed>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[{}] Price walk started at {}", self.ticker, self.mid);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let quote = self.next_quote();
                    let reached = feed.publish(&self.ticker, quote);
                    debug!(
                        "[{}] buy={} sell={} -> {} subscribers",
                        self.ticker, quote.buy_price, quote.sell_price, reached
                    );
                }
            }
        }

        info!("[{}] Price walk stopped at {}", self.ticker, self.mid);
    }
}

//! Trader Registry - ticker → robot id → Trader
//!
//! The registry is the only shared mutable structure in the engine. All
//! access goes through [`TraderRegistry::lock`], which hands out the
//! [`TraderBooks`] behind a single mutex; a caller keeps the guard for the
//! whole read-then-write sequence it needs and never holds a reference into
//! the books across an await on I/O.
//!
//! Besides the traders, each ticker's book carries its feed slot. Claiming a
//! slot happens under the same lock as the upserts that created the book, so
//! two scans can never start two subscriptions for one ticker.

use crate::backoff::ExponentialBackoff;
use crate::trader::Trader;
use robotrader_core::{Robot, RobotId, Ticker, TradeMode};
use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Identifies one started subscription for a ticker
pub type Generation = u64;

/// Feed slot of a ticker's book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// No subscription yet
    Idle,
    /// A subscription task owns the feed
    Running { generation: Generation },
    /// The last subscription failed; retry once `until` has passed
    CoolingDown { until: Instant },
}

/// Outcome of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// New trader, starting in `Buying`
    Inserted,
    /// Existing trader, snapshot replaced and mode kept
    Refreshed,
    /// The robot changed ticker; the old trader was dropped and a new one
    /// started under the new ticker
    Moved { from: Ticker },
}

/// Verdict of a `for_each_trader` callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retain {
    Keep,
    Remove,
}

/// Read-only copy of one trader's state
#[derive(Debug, Clone, PartialEq)]
pub struct TraderSnapshot {
    pub robot_id: RobotId,
    pub mode: TradeMode,
    /// Retired on the ticker's next quote
    pub withdrawn: bool,
    pub robot: Robot,
}

struct TickerBook {
    traders: HashMap<RobotId, Trader>,
    feed: FeedState,
    backoff: ExponentialBackoff,
}

impl TickerBook {
    fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            traders: HashMap::new(),
            feed: FeedState::Idle,
            backoff,
        }
    }

    fn owned_by(&self, generation: Generation) -> bool {
        self.feed == FeedState::Running { generation }
    }
}

/// The guarded state: every operation here runs under the registry lock
pub struct TraderBooks {
    books: HashMap<Ticker, TickerBook>,
    next_generation: Generation,
    backoff: ExponentialBackoff,
}

impl TraderBooks {
    /// `backoff` is cloned into each new ticker book
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            books: HashMap::new(),
            next_generation: 1,
            backoff,
        }
    }

    /// Insert a trader for `robot`, or refresh the existing one
    pub fn upsert(&mut self, robot: Robot) -> Upsert {
        let robot_id = robot.robot_id;
        let ticker = robot.ticker.clone();

        let previous = self
            .books
            .iter()
            .find(|(t, book)| **t != ticker && book.traders.contains_key(&robot_id))
            .map(|(t, _)| t.clone());
        if let Some(from) = &previous {
            self.remove(from, &[robot_id]);
        }

        let backoff = self.backoff.clone();
        let book = self
            .books
            .entry(ticker)
            .or_insert_with(|| TickerBook::new(backoff));

        match book.traders.entry(robot_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().refresh(robot);
                Upsert::Refreshed
            }
            Entry::Vacant(entry) => {
                entry.insert(Trader::new(robot));
                match previous {
                    Some(from) => Upsert::Moved { from },
                    None => Upsert::Inserted,
                }
            }
        }
    }

    /// Withdraw every trader whose robot is not in `eligible`
    ///
    /// Traders stay registered; the ticker's subscription retires them on
    /// its next quote. Returns the newly withdrawn `(ticker, robot id)`
    /// pairs.
    pub fn withdraw_missing(&mut self, eligible: &HashSet<RobotId>) -> Vec<(Ticker, RobotId)> {
        let mut withdrawn = Vec::new();
        for (ticker, book) in self.books.iter_mut() {
            for (id, trader) in book.traders.iter_mut() {
                if !eligible.contains(id) && trader.withdraw() {
                    withdrawn.push((ticker.clone(), *id));
                }
            }
        }
        withdrawn.sort();
        withdrawn
    }

    /// Withdraw the trader of `robot_id`, wherever it is registered
    pub fn withdraw(&mut self, robot_id: RobotId) -> Option<Ticker> {
        self.books.iter_mut().find_map(|(ticker, book)| {
            let trader = book.traders.get_mut(&robot_id)?;
            trader.withdraw().then(|| ticker.clone())
        })
    }

    pub fn has_ticker_entries(&self, ticker: &str) -> bool {
        self.books
            .get(ticker)
            .is_some_and(|book| !book.traders.is_empty())
    }

    /// Apply `f` to every trader under `ticker`
    ///
    /// Returns the ids for which `f` answered [`Retain::Remove`]. Nothing is
    /// removed here; the caller applies the removal with [`remove`] once it
    /// is done with the ids.
    ///
    /// [`remove`]: TraderBooks::remove
    pub fn for_each_trader<F>(&mut self, ticker: &str, mut f: F) -> Vec<RobotId>
    where
        F: FnMut(&mut Trader) -> Retain,
    {
        let Some(book) = self.books.get_mut(ticker) else {
            return Vec::new();
        };

        let mut to_remove = Vec::new();
        for (id, trader) in book.traders.iter_mut() {
            if f(trader) == Retain::Remove {
                to_remove.push(*id);
            }
        }
        to_remove
    }

    /// Delete the listed robots under `ticker`
    ///
    /// Returns how many traders remain. A book left empty is dropped
    /// together with its feed slot, which tells the owning subscription to
    /// stop.
    pub fn remove(&mut self, ticker: &str, ids: &[RobotId]) -> usize {
        let Some(book) = self.books.get_mut(ticker) else {
            return 0;
        };

        for id in ids {
            book.traders.remove(id);
        }

        let remaining = book.traders.len();
        if remaining == 0 {
            self.books.remove(ticker);
        }
        remaining
    }

    /// Claim the feed slot of every book that has traders but no running
    /// subscription, skipping books still cooling down
    pub fn claim_feeds(&mut self, now: Instant) -> Vec<(Ticker, Generation)> {
        let mut claimed = Vec::new();

        for (ticker, book) in self.books.iter_mut() {
            if book.traders.is_empty() {
                continue;
            }
            let ready = match book.feed {
                FeedState::Idle => true,
                FeedState::CoolingDown { until } => until <= now,
                FeedState::Running { .. } => false,
            };
            if ready {
                let generation = self.next_generation;
                self.next_generation += 1;
                book.feed = FeedState::Running { generation };
                claimed.push((ticker.clone(), generation));
            }
        }

        claimed.sort();
        claimed
    }

    /// Whether the subscription identified by `generation` still owns the
    /// ticker's feed slot
    pub fn owns_feed(&self, ticker: &str, generation: Generation) -> bool {
        self.books
            .get(ticker)
            .is_some_and(|book| book.owned_by(generation))
    }

    /// Record a successful stream open; resets the reconnect backoff
    pub fn feed_opened(&mut self, ticker: &str, generation: Generation) {
        if let Some(book) = self.books.get_mut(ticker) {
            if book.owned_by(generation) {
                book.backoff.reset();
            }
        }
    }

    /// Give up the feed slot after a failure
    ///
    /// Traders stay registered with their modes; the slot cools down and a
    /// later scan claims it again. Returns the cool-down, or `None` if this
    /// subscription no longer owned the slot.
    pub fn release_feed(
        &mut self,
        ticker: &str,
        generation: Generation,
        now: Instant,
    ) -> Option<Duration> {
        let book = self.books.get_mut(ticker)?;
        if !book.owned_by(generation) {
            return None;
        }

        let delay = book.backoff.next_delay();
        book.feed = FeedState::CoolingDown { until: now + delay };
        Some(delay)
    }

    pub fn feed_state(&self, ticker: &str) -> Option<FeedState> {
        self.books.get(ticker).map(|book| book.feed)
    }

    pub fn trader(&self, ticker: &str, robot_id: RobotId) -> Option<&Trader> {
        self.books.get(ticker)?.traders.get(&robot_id)
    }

    /// Copies of every trader under `ticker`, ordered by robot id
    pub fn snapshot(&self, ticker: &str) -> Vec<TraderSnapshot> {
        let mut snapshots: Vec<_> = self
            .books
            .get(ticker)
            .map(|book| {
                book.traders
                    .values()
                    .map(|trader| TraderSnapshot {
                        robot_id: trader.robot_id(),
                        mode: trader.mode(),
                        withdrawn: trader.is_withdrawn(),
                        robot: trader.robot().clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        snapshots.sort_by_key(|s| s.robot_id);
        snapshots
    }

    /// Tickers whose feed slot is currently owned by a subscription
    pub fn running_tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<_> = self
            .books
            .iter()
            .filter(|(_, book)| matches!(book.feed, FeedState::Running { .. }))
            .map(|(ticker, _)| ticker.clone())
            .collect();
        tickers.sort();
        tickers
    }

    pub fn trader_count(&self) -> usize {
        self.books.values().map(|book| book.traders.len()).sum()
    }
}

/// Process-wide, lock-guarded trader registry
pub struct TraderRegistry {
    books: Mutex<TraderBooks>,
}

impl TraderRegistry {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            books: Mutex::new(TraderBooks::new(backoff)),
        }
    }

    /// Enter the registry's critical section
    pub async fn lock(&self) -> MutexGuard<'_, TraderBooks> {
        self.books.lock().await
    }
}

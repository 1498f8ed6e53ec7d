//! Activation Scanner - periodic reconciliation of eligible robots
//!
//! Every tick the scanner asks the store which robots may run now, upserts
//! them into the registry and, in the same critical section, claims the
//! feed slot of every ticker that needs a subscription. The subscriptions
//! themselves are spawned after the lock is released.
//!
//! A trader whose robot is missing from a successful scan is withdrawn: its
//! subscription retires it on the next quote without acting, so a robot that
//! was deactivated or deleted in the store is never written back.
//!
//! Robots announced through the engine handle go through the same path
//! between ticks. The scanner owns every subscription task it starts and
//! waits for all of them on shutdown.

use crate::registry::Upsert;
use crate::subscription::{EngineContext, Subscription, SubscriptionExit};
use log::{debug, error, info, warn};
use robotrader_core::Robot;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

pub struct Scanner {
    ctx: EngineContext,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    track_rx: mpsc::Receiver<Robot>,
    subscriptions: JoinSet<SubscriptionExit>,
}

impl Scanner {
    pub fn new(
        ctx: EngineContext,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
        track_rx: mpsc::Receiver<Robot>,
    ) -> Self {
        Self {
            ctx,
            interval,
            shutdown,
            track_rx,
            subscriptions: JoinSet::new(),
        }
    }

    /// Run until the shutdown signal, then wait for every subscription
    pub async fn run(mut self) {
        info!("Activation scanner started, interval {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                _ = ticker.tick() => self.scan_once().await,

                Some(robot) = self.track_rx.recv() => self.track(robot).await,

                Some(joined) = self.subscriptions.join_next(), if !self.subscriptions.is_empty() => {
                    Self::log_exit(joined);
                }
            }
        }

        info!(
            "Activation scanner stopping, waiting for {} subscriptions",
            self.subscriptions.len()
        );
        while let Some(joined) = self.subscriptions.join_next().await {
            Self::log_exit(joined);
        }
        info!("Activation scanner stopped");
    }

    /// One reconciliation pass against the store
    pub async fn scan_once(&mut self) {
        let as_of = self.ctx.clock.now();
        match self.ctx.store.robots_eligible_to_run(as_of).await {
            Ok(robots) => {
                debug!("Scan found {} eligible robots", robots.len());
                self.reconcile(robots, true).await;
            }
            Err(e) => {
                error!("Can't fetch robots to run, skipping tick: {}", e);
            }
        }
    }

    /// Register one robot outside the periodic scan
    ///
    /// An ineligible robot never starts a trader, but withdraws the one
    /// already running for it.
    async fn track(&mut self, robot: Robot) {
        if robot.is_eligible_at(self.ctx.clock.now()) {
            self.reconcile(vec![robot], false).await;
            return;
        }

        let withdrawn = self.ctx.registry.lock().await.withdraw(robot.robot_id);
        match withdrawn {
            Some(ticker) => info!(
                "[{}] Robot {} is no longer eligible, stops on next quote",
                ticker, robot.robot_id
            ),
            None => debug!(
                "Robot {} is not eligible yet, leaving it to the scanner",
                robot.robot_id
            ),
        }
    }

    /// Upsert `robots` and claim feeds; with `complete`, `robots` is the
    /// whole eligible set and every other trader is withdrawn
    async fn reconcile(&mut self, robots: Vec<Robot>, complete: bool) {
        let claimed = {
            let mut books = self.ctx.registry.lock().await;
            if complete {
                let eligible: HashSet<_> = robots.iter().map(|r| r.robot_id).collect();
                for (ticker, robot_id) in books.withdraw_missing(&eligible) {
                    info!(
                        "[{}] Robot {} is no longer eligible, stops on next quote",
                        ticker, robot_id
                    );
                }
            }
            for robot in robots {
                let robot_id = robot.robot_id;
                let ticker = robot.ticker.clone();
                match books.upsert(robot) {
                    Upsert::Inserted => info!("[{}] Robot {} starts trading", ticker, robot_id),
                    Upsert::Moved { from } => info!(
                        "[{}] Robot {} moved over from {}, trading restarts",
                        ticker, robot_id, from
                    ),
                    Upsert::Refreshed => {}
                }
            }
            books.claim_feeds(Instant::now())
        };

        for (ticker, generation) in claimed {
            info!("[{}] Starting subscription {}", ticker, generation);
            let subscription = Subscription::new(
                ticker,
                generation,
                self.ctx.clone(),
                self.shutdown.clone(),
            );
            self.subscriptions.spawn(subscription.run());
        }
    }

    fn log_exit(joined: Result<SubscriptionExit, tokio::task::JoinError>) {
        match joined {
            Ok(exit) => debug!("Subscription task finished: {:?}", exit),
            Err(e) => warn!("Subscription task failed: {}", e),
        }
    }
}

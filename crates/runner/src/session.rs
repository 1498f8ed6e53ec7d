//! Session - one single-process run of the whole system
//!
//! Ties together:
//! - In-memory robot store with broadcast change notification
//! - Channel price feed driven by one price walk per ticker
//! - The execution engine

use crate::bootstrap::{report_changes, seed_robots};
use crate::config::RunnerConfig;
use crate::error::Result;
use crate::price_walk::PriceWalk;
use log::{info, warn};
use robotrader_core::Robot;
use robotrader_engine::Engine;
use robotrader_gateway::{BroadcastNotifier, ChannelPriceFeed, InMemoryRobotStore};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// State of the store when the session ended
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub robots: Vec<Robot>,
}

impl SessionReport {
    pub fn total_deals(&self) -> i64 {
        self.robots.iter().map(|r| r.deals_count).sum()
    }
}

/// Run everything until `stop` completes, then shut down in order:
/// engine first, then price walks, then change reporting
pub async fn run_session<F>(config: RunnerConfig, stop: F) -> Result<SessionReport>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let notifier = Arc::new(BroadcastNotifier::default());
    let store = Arc::new(InMemoryRobotStore::new().with_notifier(notifier.clone()));
    let feed = Arc::new(ChannelPriceFeed::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reporter = tokio::spawn(report_changes(notifier.subscribe(), shutdown_rx.clone()));

    let seeded = seed_robots(store.as_ref(), config.robots.clone()).await?;
    for robot in &seeded {
        if !config.tickers.contains_key(&robot.ticker) {
            warn!(
                "[{}] Robot {} has no simulated prices and will never trade",
                robot.ticker, robot.robot_id
            );
        }
    }

    let engine = Engine::new(config.engine.clone(), store.clone(), feed.clone()).start()?;

    let mut walks = JoinSet::new();
    for (i, (ticker, mid)) in config.tickers.iter().enumerate() {
        let walk = match config.seed {
            Some(seed) => PriceWalk::with_seed(
                ticker.clone(),
                *mid,
                config.volatility,
                config.spread,
                seed.wrapping_add(i as u64),
            ),
            None => PriceWalk::new(ticker.clone(), *mid, config.volatility, config.spread),
        };
        walks.spawn(walk.run(feed.clone(), config.quote_interval(), shutdown_rx.clone()));
    }
    info!(
        "Session running: {} robots, {} tickers",
        seeded.len(),
        config.tickers.len()
    );

    stop.await;

    info!("Session stopping");
    let stopped = engine.shutdown().await;
    // Receivers only disappear once their tasks are done
    let _ = shutdown_tx.send(true);
    while let Some(joined) = walks.join_next().await {
        if let Err(e) = joined {
            warn!("Price walk task failed: {}", e);
        }
    }
    if let Err(e) = reporter.await {
        warn!("Change report task failed: {}", e);
    }
    stopped?;

    let report = SessionReport {
        robots: store.all_robots().await,
    };
    for robot in &report.robots {
        info!(
            "[{}] Robot {}: deals={} fact_yield={}",
            robot.ticker, robot.robot_id, robot.deals_count, robot.fact_yield
        );
    }
    Ok(report)
}

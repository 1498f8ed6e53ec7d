//! Engine façade - wires scanner, registry and subscriptions to one
//! cancellable lifetime

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::{TraderRegistry, TraderSnapshot};
use crate::scanner::Scanner;
use crate::subscription::EngineContext;
use log::info;
use robotrader_clock::SystemClock;
use robotrader_core::{Robot, Ticker};
use robotrader_ports::{Clock, PriceFeed, RobotStore};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Execution engine, not yet started
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn RobotStore>,
    feed: Arc<dyn PriceFeed>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Create an engine on wall-clock time
    pub fn new(config: EngineConfig, store: Arc<dyn RobotStore>, feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            config,
            store,
            feed,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for eligibility and plan-window checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn the scanner on the current tokio runtime
    pub fn start(self) -> Result<EngineHandle> {
        self.config.validate()?;

        let registry = Arc::new(TraderRegistry::new(self.config.reconnect_backoff()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (track_tx, track_rx) = mpsc::channel(self.config.track_capacity);

        let ctx = EngineContext {
            registry: registry.clone(),
            store: self.store,
            feed: self.feed,
            clock: self.clock,
        };
        let scanner = Scanner::new(ctx, self.config.scan_interval(), shutdown_rx, track_rx);

        info!("Engine starting with {:?}", self.config);
        let scanner = tokio::spawn(scanner.run());

        Ok(EngineHandle {
            registry,
            shutdown_tx,
            track_tx,
            scanner,
        })
    }
}

/// Control surface of a running engine
///
/// Dropping the handle without calling [`shutdown`] also stops the engine,
/// but nothing waits for the tasks to finish.
///
/// [`shutdown`]: EngineHandle::shutdown
pub struct EngineHandle {
    registry: Arc<TraderRegistry>,
    shutdown_tx: watch::Sender<bool>,
    track_tx: mpsc::Sender<Robot>,
    scanner: JoinHandle<()>,
}

impl EngineHandle {
    /// Start trading a newly created robot without waiting for the next scan
    ///
    /// Robots that are not eligible yet are ignored here; the periodic scan
    /// picks them up once their window opens. An ineligible row for a robot
    /// that is already trading stops its trader on the ticker's next quote.
    pub async fn track(&self, robot: Robot) -> Result<()> {
        self.track_tx
            .send(robot)
            .await
            .map_err(|_| EngineError::Stopped)
    }

    /// Copies of the traders currently registered under `ticker`
    pub async fn snapshot(&self, ticker: &str) -> Vec<TraderSnapshot> {
        self.registry.lock().await.snapshot(ticker)
    }

    /// Tickers with a running subscription
    pub async fn tickers(&self) -> Vec<Ticker> {
        self.registry.lock().await.running_tickers()
    }

    pub async fn trader_count(&self) -> usize {
        self.registry.lock().await.trader_count()
    }

    /// Signal every task to stop and wait for them
    pub async fn shutdown(self) -> Result<()> {
        info!("Engine shutting down");
        // Receivers may already be gone if the scanner panicked
        let _ = self.shutdown_tx.send(true);
        self.scanner.await?;
        info!("Engine stopped");
        Ok(())
    }
}

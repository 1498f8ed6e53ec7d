//! Integration test: Engine <-> in-process store, feed and notifier
//!
//! Drives the full loop:
//! Store scan -> Registry -> Subscription -> fills -> Store writes -> Notifier

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use robotrader_clock::ManualClock;
use robotrader_core::{Quote, Robot, RobotId, Timestamp, TradeMode};
use robotrader_engine::{Engine, EngineConfig, EngineHandle};
use robotrader_gateway::{BroadcastNotifier, ChannelPriceFeed, InMemoryRobotStore};
use robotrader_ports::{Clock, RobotStore, StoreResult};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::time::Instant;

const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

/// Poll `cond` until it holds, failing the test after `WAIT`
macro_rules! wait_until {
    ($what:expr, $cond:expr) => {{
        let deadline = Instant::now() + WAIT;
        loop {
            if $cond {
                break;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {}", $what);
            tokio::time::sleep(POLL).await;
        }
    }};
}

struct Harness {
    clock: ManualClock,
    store: Arc<InMemoryRobotStore>,
    feed: Arc<ChannelPriceFeed>,
    notifier: Arc<BroadcastNotifier>,
}

impl Harness {
    fn new() -> Self {
        let _ = env_logger::try_init();

        let clock = ManualClock::starting_now();
        let notifier = Arc::new(BroadcastNotifier::new(64));
        let store = Arc::new(
            InMemoryRobotStore::new()
                .with_clock(Arc::new(clock.clone()))
                .with_notifier(notifier.clone()),
        );

        Self {
            clock,
            store,
            feed: Arc::new(ChannelPriceFeed::new(64)),
            notifier,
        }
    }

    /// Only the immediate first scan runs during a test
    fn quiet_config() -> EngineConfig {
        EngineConfig {
            scan_interval_ms: 60_000,
            ..EngineConfig::default()
        }
    }

    /// Rescans and reconnects happen within milliseconds
    fn busy_config() -> EngineConfig {
        EngineConfig {
            scan_interval_ms: 20,
            reconnect_base_ms: 10,
            reconnect_max_ms: 40,
            reconnect_jitter: 0.0,
            ..EngineConfig::default()
        }
    }

    fn start(&self, config: EngineConfig) -> EngineHandle {
        self.start_with(config, self.store.clone())
    }

    fn start_with(&self, config: EngineConfig, store: Arc<dyn RobotStore>) -> EngineHandle {
        Engine::new(config, store, self.feed.clone())
            .with_clock(Arc::new(self.clock.clone()))
            .start()
            .expect("Failed to start engine")
    }

    async fn is_withdrawn(&self, engine: &EngineHandle, ticker: &str, id: i64) -> bool {
        engine
            .snapshot(ticker)
            .await
            .iter()
            .any(|s| s.robot_id == id && s.withdrawn)
    }

    async fn robot(&self, id: i64) -> Robot {
        self.store.get_robot(id).await.expect("robot exists")
    }

    async fn mode_of(&self, engine: &EngineHandle, ticker: &str, id: i64) -> Option<TradeMode> {
        engine
            .snapshot(ticker)
            .await
            .into_iter()
            .find(|s| s.robot_id == id)
            .map(|s| s.mode)
    }
}

/// The example robot: buys at or below 56.5, sells at or above 46.78
fn aapl_robot() -> Robot {
    Robot::new(4, 1, "AAPL", dec!(56.5), dec!(46.78)).with_active(true)
}

/// Store whose writes for one ticker wait until released
struct GatedStore {
    inner: Arc<InMemoryRobotStore>,
    gated: &'static str,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn new(inner: Arc<InMemoryRobotStore>, gated: &'static str) -> Self {
        Self {
            inner,
            gated,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl RobotStore for GatedStore {
    async fn create_robot(&self, robot: &Robot) -> StoreResult<()> {
        self.inner.create_robot(robot).await
    }

    async fn update_robot(&self, robot: &Robot) -> StoreResult<()> {
        if robot.ticker == self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.update_robot(robot).await
    }

    async fn robots_eligible_to_run(&self, as_of: Timestamp) -> StoreResult<Vec<Robot>> {
        self.inner.robots_eligible_to_run(as_of).await
    }

    async fn next_robot_id(&self) -> StoreResult<RobotId> {
        self.inner.next_robot_id().await
    }
}

fn drain(rx: &mut broadcast::Receiver<Robot>) -> Vec<Robot> {
    let mut seen = Vec::new();
    while let Ok(robot) = rx.try_recv() {
        seen.push(robot);
    }
    seen
}

#[tokio::test]
async fn test_buy_then_sell_round_trip() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    let mut changes = h.notifier.subscribe();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);
    assert_eq!(engine.tickers().await, vec!["AAPL".to_string()]);
    assert_eq!(h.mode_of(&engine, "AAPL", 4).await, Some(TradeMode::Buying));

    // Buy fires at the quoted buy price
    h.feed.publish("AAPL", Quote::new(dec!(56.5), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-56.5));
    assert_eq!(h.robot(4).await.deals_count, 0);
    assert_eq!(h.mode_of(&engine, "AAPL", 4).await, Some(TradeMode::Selling));

    // Sell fires at the quoted sell price and closes the deal
    h.feed.publish("AAPL", Quote::new(dec!(40), dec!(46.78)));
    wait_until!("sell fill", h.robot(4).await.deals_count == 1);
    assert_eq!(h.robot(4).await.fact_yield, dec!(-9.72));
    assert_eq!(h.mode_of(&engine, "AAPL", 4).await, Some(TradeMode::Buying));

    let seen = drain(&mut changes);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].fact_yield, dec!(-56.5));
    assert_eq!(seen[1].deals_count, 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_quote_not_crossing_does_nothing() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    let writes = h.store.write_count();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    h.feed.publish("AAPL", Quote::new(dec!(60), dec!(50)));
    // A crossing quote behind it proves the first one was handled
    h.feed.publish("AAPL", Quote::new(dec!(56), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-56));
    assert_eq!(h.store.write_count(), writes + 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_expired_plan_is_removed_without_acting() {
    let h = Harness::new();
    let now = h.clock.now();
    let robot = aapl_robot().with_plan(
        now - ChronoDuration::seconds(10),
        now - ChronoDuration::seconds(1),
    );
    h.store.create_robot(&robot).await.unwrap();
    let writes = h.store.write_count();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);
    assert_eq!(engine.trader_count().await, 1);

    // Crosses both thresholds, yet nothing may fire
    h.feed.publish("AAPL", Quote::new(dec!(1), dec!(100)));
    wait_until!("removal", engine.trader_count().await == 0);
    wait_until!("teardown", h.feed.subscriber_count("AAPL") == 0);

    assert_eq!(h.store.write_count(), writes);
    assert_eq!(h.robot(4).await.fact_yield, dec!(0));
    assert!(engine.tickers().await.is_empty());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_plan_end_reached_while_trading() {
    let h = Harness::new();
    let now = h.clock.now();
    let robot = Robot::new(7, 1, "MSFT", dec!(300), dec!(320))
        .with_plan(now, now + ChronoDuration::minutes(10));
    h.store.create_robot(&robot).await.unwrap();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("MSFT") == 1);

    h.feed.publish("MSFT", Quote::new(dec!(299), dec!(310)));
    wait_until!("buy fill", h.robot(7).await.fact_yield == dec!(-299));

    h.clock.advance(ChronoDuration::minutes(10));
    h.feed.publish("MSFT", Quote::new(dec!(299), dec!(330)));
    wait_until!("removal", engine.trader_count().await == 0);

    let robot = h.robot(7).await;
    assert_eq!(robot.fact_yield, dec!(-299));
    assert_eq!(robot.deals_count, 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_write_removes_trader_on_same_quote() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    h.store
        .create_robot(&Robot::new(5, 2, "AAPL", dec!(10), dec!(20)).with_active(true))
        .await
        .unwrap();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);
    assert_eq!(engine.trader_count().await, 2);

    h.store.fail_updates(true);
    // Only robot 4 wants to buy at this price
    h.feed.publish("AAPL", Quote::new(dec!(56.5), dec!(50)));
    wait_until!("removal", engine.trader_count().await == 1);

    let remaining = engine.snapshot("AAPL").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].robot_id, 5);
    assert_eq!(h.robot(4).await.fact_yield, dec!(0));

    // The ticker keeps streaming for the robot still there
    h.store.fail_updates(false);
    h.feed.publish("AAPL", Quote::new(dec!(9), dec!(50)));
    wait_until!("buy fill", h.robot(5).await.fact_yield == dec!(-9));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_last_trader_removal_releases_feed() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    h.store.fail_updates(true);
    h.feed.publish("AAPL", Quote::new(dec!(50), dec!(50)));
    wait_until!("teardown", h.feed.subscriber_count("AAPL") == 0);
    assert_eq!(engine.trader_count().await, 0);
    assert!(engine.tickers().await.is_empty());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_scans_are_idempotent() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    h.feed.publish("AAPL", Quote::new(dec!(56.5), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-56.5));

    // Several scans later: one trader, one subscription, mode untouched
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(engine.trader_count().await, 1);
    assert_eq!(h.feed.subscriber_count("AAPL"), 1);
    assert_eq!(h.mode_of(&engine, "AAPL", 4).await, Some(TradeMode::Selling));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rescan_picks_up_new_settings() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    let mut edited = h.robot(4).await;
    edited.buy_price = dec!(70);
    h.store.update_robot(&edited).await.unwrap();
    wait_until!(
        "refresh",
        engine.snapshot("AAPL").await[0].robot.buy_price == dec!(70)
    );

    h.feed.publish("AAPL", Quote::new(dec!(65), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-65));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ticker_change_moves_trader() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    let mut edited = h.robot(4).await;
    edited.ticker = "MSFT".to_string();
    h.store.update_robot(&edited).await.unwrap();
    wait_until!("move", h.feed.subscriber_count("MSFT") == 1);
    assert!(engine.snapshot("AAPL").await.is_empty());
    assert_eq!(engine.snapshot("MSFT").await.len(), 1);

    // The orphaned AAPL subscription notices on its next quote
    h.feed.publish("AAPL", Quote::new(dec!(50), dec!(50)));
    wait_until!("old teardown", h.feed.subscriber_count("AAPL") == 0);
    assert_eq!(h.robot(4).await.fact_yield, dec!(0));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_after_stream_end_keeps_mode() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    h.feed.publish("AAPL", Quote::new(dec!(56.5), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-56.5));

    h.feed.close("AAPL");
    wait_until!("resubscribe", h.feed.subscriber_count("AAPL") == 1);
    assert_eq!(h.mode_of(&engine, "AAPL", 4).await, Some(TradeMode::Selling));

    h.feed.publish("AAPL", Quote::new(dec!(40), dec!(46.78)));
    wait_until!("sell fill", h.robot(4).await.deals_count == 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_after_stream_error() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    // Keep the new subscription from racing the old one's exit
    h.feed.refuse_subscriptions("AAPL", true);
    h.feed.fail_stream("AAPL", "connection reset");
    wait_until!("stream dropped", h.feed.subscriber_count("AAPL") == 0);
    assert_eq!(engine.trader_count().await, 1);

    h.feed.refuse_subscriptions("AAPL", false);
    wait_until!("resubscribe", h.feed.subscriber_count("AAPL") == 1);

    h.feed.publish("AAPL", Quote::new(dec!(56.5), dec!(50)));
    wait_until!("buy fill", h.robot(4).await.fact_yield == dec!(-56.5));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_refused_feed_is_retried() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    h.feed.refuse_subscriptions("AAPL", true);

    let engine = h.start(Harness::busy_config());
    wait_until!("scan", engine.trader_count().await == 1);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.feed.subscriber_count("AAPL"), 0);
    assert_eq!(engine.trader_count().await, 1);

    h.feed.refuse_subscriptions("AAPL", false);
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_scan_is_skipped() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    h.store.fail_scans(true);

    let engine = h.start(Harness::busy_config());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.trader_count().await, 0);

    h.store.fail_scans(false);
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_track_starts_trading_before_next_scan() {
    let h = Harness::new();
    let engine = h.start(Harness::quiet_config());

    // Never stored, so no scan can find them
    let idle = Robot::new(1, 1, "AAPL", dec!(10), dec!(20));
    let robot = aapl_robot();

    // Neither active nor in a window: ignored
    engine.track(idle).await.unwrap();
    engine.track(robot).await.unwrap();

    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);
    assert_eq!(engine.trader_count().await, 1);
    assert_eq!(engine.snapshot("AAPL").await[0].robot_id, 4);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_one_subscription_per_ticker() {
    let h = Harness::new();
    for (id, ticker) in [(1, "AAPL"), (2, "AAPL"), (3, "MSFT")] {
        h.store
            .create_robot(&Robot::new(id, 1, ticker, dec!(10), dec!(20)).with_active(true))
            .await
            .unwrap();
    }

    let engine = h.start(Harness::busy_config());
    wait_until!(
        "subscriptions",
        h.feed.subscriber_count("AAPL") == 1 && h.feed.subscriber_count("MSFT") == 1
    );
    assert_eq!(
        engine.tickers().await,
        vec!["AAPL".to_string(), "MSFT".to_string()]
    );

    // One quote reaches both AAPL robots
    h.feed.publish("AAPL", Quote::new(dec!(10), dec!(15)));
    wait_until!(
        "both fills",
        h.robot(1).await.fact_yield == dec!(-10) && h.robot(2).await.fact_yield == dec!(-10)
    );
    assert_eq!(h.robot(3).await.fact_yield, dec!(0));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_every_feed() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    h.store
        .create_robot(&Robot::new(9, 1, "MSFT", dec!(10), dec!(20)).with_active(true))
        .await
        .unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!(
        "subscriptions",
        h.feed.subscriber_count("AAPL") == 1 && h.feed.subscriber_count("MSFT") == 1
    );

    tokio::time::timeout(WAIT, engine.shutdown())
        .await
        .expect("shutdown timed out")
        .unwrap();

    assert_eq!(h.feed.subscriber_count("AAPL"), 0);
    assert_eq!(h.feed.subscriber_count("MSFT"), 0);
}

#[tokio::test]
async fn test_deleted_robot_stops_without_trading() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::busy_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    h.store.deactivate_robot(4).await.unwrap();
    h.store.delete_robot(4).await.unwrap();
    wait_until!("withdrawal", h.is_withdrawn(&engine, "AAPL", 4).await);
    let writes = h.store.write_count();

    // Crosses the buy threshold, yet nothing may fire
    h.feed.publish("AAPL", Quote::new(dec!(50), dec!(50)));
    wait_until!("removal", engine.trader_count().await == 0);
    wait_until!("teardown", h.feed.subscriber_count("AAPL") == 0);

    assert_eq!(h.store.write_count(), writes);
    let robot = h.robot(4).await;
    assert_eq!(robot.fact_yield, dec!(0));
    assert!(!robot.is_active);
    assert!(robot.is_deleted());

    // Later scans leave it alone
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.trader_count().await, 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_track_withdraws_deactivated_robot() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();

    let engine = h.start(Harness::quiet_config());
    wait_until!("subscription", h.feed.subscriber_count("AAPL") == 1);

    let deactivated = h.store.deactivate_robot(4).await.unwrap();
    engine.track(deactivated).await.unwrap();
    wait_until!("withdrawal", h.is_withdrawn(&engine, "AAPL", 4).await);

    h.feed.publish("AAPL", Quote::new(dec!(50), dec!(50)));
    wait_until!("removal", engine.trader_count().await == 0);

    let robot = h.robot(4).await;
    assert_eq!(robot.fact_yield, dec!(0));
    assert!(!robot.is_active);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_parked_write_does_not_block_other_tickers() {
    let h = Harness::new();
    h.store.create_robot(&aapl_robot()).await.unwrap();
    h.store
        .create_robot(&Robot::new(9, 1, "MSFT", dec!(300), dec!(320)).with_active(true))
        .await
        .unwrap();
    let gate = Arc::new(GatedStore::new(h.store.clone(), "AAPL"));

    let engine = h.start_with(Harness::quiet_config(), gate.clone());
    wait_until!(
        "subscriptions",
        h.feed.subscriber_count("AAPL") == 1 && h.feed.subscriber_count("MSFT") == 1
    );

    h.feed.publish("AAPL", Quote::new(dec!(50), dec!(50)));
    tokio::time::timeout(WAIT, gate.entered.notified())
        .await
        .expect("AAPL write never started");

    // AAPL's write is parked; MSFT still trades and persists
    h.feed.publish("MSFT", Quote::new(dec!(299), dec!(310)));
    wait_until!("MSFT fill", h.robot(9).await.fact_yield == dec!(-299));

    // The registry is free while the write waits
    let snapshot = tokio::time::timeout(Duration::from_secs(1), engine.snapshot("AAPL"))
        .await
        .expect("registry held during a write");
    assert_eq!(snapshot[0].mode, TradeMode::Selling);
    assert_eq!(h.robot(4).await.fact_yield, dec!(0));

    gate.release.notify_one();
    wait_until!("AAPL fill", h.robot(4).await.fact_yield == dec!(-50));

    engine.shutdown().await.unwrap();
}

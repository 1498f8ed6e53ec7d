//! In-memory robot persistence
//!
//! Mirrors the full robot storage surface (lookups by id, owner, ticker;
//! activation, deactivation, soft delete) on top of a map. Every successful
//! write is forwarded to the configured notifier, failed writes are not.

use async_trait::async_trait;
use log::debug;
use robotrader_clock::SystemClock;
use robotrader_core::{Robot, RobotId, Timestamp, UserId};
use robotrader_ports::{Clock, RobotNotifier, RobotStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryRobotStore {
    robots: RwLock<BTreeMap<RobotId, Robot>>,
    notifier: Option<Arc<dyn RobotNotifier>>,
    clock: Arc<dyn Clock>,
    fail_updates: AtomicBool,
    fail_scans: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryRobotStore {
    pub fn new() -> Self {
        Self {
            robots: RwLock::new(BTreeMap::new()),
            notifier: None,
            clock: Arc::new(SystemClock),
            fail_updates: AtomicBool::new(false),
            fail_scans: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Forward every successful write to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn RobotNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Clock used to stamp activation, deactivation and deletion
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Make `update_robot` fail with `Unavailable` until switched back
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `robots_eligible_to_run` fail with `Unavailable` until switched back
    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get_robot(&self, robot_id: RobotId) -> Option<Robot> {
        self.robots.read().await.get(&robot_id).cloned()
    }

    pub async fn all_robots(&self) -> Vec<Robot> {
        self.robots.read().await.values().cloned().collect()
    }

    pub async fn robots_by_owner(&self, owner: UserId) -> Vec<Robot> {
        self.filter(|robot| robot.owner_user_id == owner).await
    }

    pub async fn robots_by_ticker(&self, ticker: &str) -> Vec<Robot> {
        self.filter(|robot| robot.ticker == ticker).await
    }

    /// Either key may be left unset: an empty ticker matches any ticker,
    /// owner 0 matches any owner
    pub async fn robots_by_ticker_and_owner(&self, ticker: &str, owner: UserId) -> Vec<Robot> {
        self.filter(|robot| {
            (ticker.is_empty() || robot.ticker == ticker)
                && (owner == 0 || robot.owner_user_id == owner)
        })
        .await
    }

    pub async fn activate_robot(&self, robot_id: RobotId) -> StoreResult<Robot> {
        let now = self.clock.now();
        self.modify(robot_id, |robot| robot.activate(now)).await
    }

    pub async fn deactivate_robot(&self, robot_id: RobotId) -> StoreResult<Robot> {
        let now = self.clock.now();
        self.modify(robot_id, |robot| robot.deactivate(now)).await
    }

    /// Soft delete: the row stays, stamped with `deleted_at`
    pub async fn delete_robot(&self, robot_id: RobotId) -> StoreResult<Robot> {
        let now = self.clock.now();
        self.modify(robot_id, |robot| robot.mark_deleted(now)).await
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Robot>
    where
        F: Fn(&Robot) -> bool,
    {
        self.robots
            .read()
            .await
            .values()
            .filter(|robot| predicate(robot))
            .cloned()
            .collect()
    }

    async fn modify<F>(&self, robot_id: RobotId, change: F) -> StoreResult<Robot>
    where
        F: FnOnce(&mut Robot),
    {
        let updated = {
            let mut robots = self.robots.write().await;
            let robot = robots
                .get_mut(&robot_id)
                .ok_or(StoreError::NotFound(robot_id))?;
            change(robot);
            robot.clone()
        };
        self.written(&updated);
        Ok(updated)
    }

    fn written(&self, robot: &Robot) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = &self.notifier {
            notifier.robot_changed(robot);
        }
    }
}

impl Default for InMemoryRobotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RobotStore for InMemoryRobotStore {
    async fn create_robot(&self, robot: &Robot) -> StoreResult<()> {
        let mut stored = robot.clone();
        stored.created_at.get_or_insert_with(|| self.clock.now());
        {
            let mut robots = self.robots.write().await;
            if robots.contains_key(&robot.robot_id) {
                return Err(StoreError::AlreadyExists(robot.robot_id));
            }
            robots.insert(robot.robot_id, stored.clone());
        }
        debug!("Robot {} created on {}", robot.robot_id, robot.ticker);
        self.written(&stored);
        Ok(())
    }

    async fn update_robot(&self, robot: &Robot) -> StoreResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "can't update robot {}",
                robot.robot_id
            )));
        }

        {
            let mut robots = self.robots.write().await;
            let stored = robots
                .get_mut(&robot.robot_id)
                .ok_or(StoreError::NotFound(robot.robot_id))?;
            *stored = robot.clone();
        }
        self.written(robot);
        Ok(())
    }

    async fn robots_eligible_to_run(&self, as_of: Timestamp) -> StoreResult<Vec<Robot>> {
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "can't get robots to run".to_string(),
            ));
        }
        Ok(self.filter(|robot| robot.is_eligible_at(as_of)).await)
    }

    async fn next_robot_id(&self) -> StoreResult<RobotId> {
        let robots = self.robots.read().await;
        Ok(robots.keys().next_back().map_or(1, |max| max + 1))
    }
}

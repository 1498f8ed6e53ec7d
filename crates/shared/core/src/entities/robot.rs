use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Ticker, Timestamp};

/// Unique identifier for a robot
pub type RobotId = i64;

/// Identifier of the user owning a robot
pub type UserId = i64;

/// A persisted, user-defined trading rule
///
/// The engine only ever holds snapshots of robots; the persistence
/// service owns the canonical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub robot_id: RobotId,
    pub owner_user_id: UserId,
    #[serde(default)]
    pub parent_robot_id: RobotId,
    #[serde(default, rename = "is_favorite")]
    pub is_favourite: bool,
    #[serde(default)]
    pub is_active: bool,
    pub ticker: Ticker,
    /// Buy when the quoted buy price drops to or below this
    pub buy_price: Price,
    /// Sell when the quoted sell price rises to or above this
    pub sell_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_end: Option<Timestamp>,
    #[serde(default)]
    pub plan_yield: Decimal,
    /// Realized P&L: sell proceeds minus buy costs
    #[serde(default)]
    pub fact_yield: Decimal,
    #[serde(default, rename = "deals_counts")]
    pub deals_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<Timestamp>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Robot {
    /// Create an inactive robot without a plan window
    pub fn new(
        robot_id: RobotId,
        owner_user_id: UserId,
        ticker: impl Into<Ticker>,
        buy_price: Price,
        sell_price: Price,
    ) -> Self {
        Self {
            robot_id,
            owner_user_id,
            parent_robot_id: 0,
            is_favourite: false,
            is_active: false,
            ticker: ticker.into(),
            buy_price,
            sell_price,
            plan_start: None,
            plan_end: None,
            plan_yield: Decimal::ZERO,
            fact_yield: Decimal::ZERO,
            deals_count: 0,
            deleted_at: None,
            activated_at: None,
            deactivated_at: None,
            created_at: None,
        }
    }

    /// Builder-style helper setting the run window
    pub fn with_plan(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.plan_start = Some(start);
        self.plan_end = Some(end);
        self
    }

    /// Builder-style helper marking the robot active
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when `now` falls inside `[plan_start, plan_end)`
    pub fn in_plan_window(&self, now: Timestamp) -> bool {
        match (self.plan_start, self.plan_end) {
            (Some(start), Some(end)) => start <= now && now < end,
            _ => false,
        }
    }

    /// Whether the engine should run this robot at `now`
    ///
    /// Not deleted, and either explicitly active or inside its plan window.
    pub fn is_eligible_at(&self, now: Timestamp) -> bool {
        !self.is_deleted() && (self.is_active || self.in_plan_window(now))
    }

    /// Whether a running trader for this robot must be retired at `now`
    ///
    /// A deleted robot is always finished. Otherwise a plan window, when
    /// present, decides on its own: the run is over once `plan_end` has been
    /// reached. Without a window the robot runs for as long as it stays
    /// active.
    pub fn has_finished_at(&self, now: Timestamp) -> bool {
        if self.is_deleted() {
            return true;
        }
        match self.plan_end {
            Some(end) => end <= now,
            None => !self.is_active,
        }
    }

    pub fn activate(&mut self, now: Timestamp) {
        self.is_active = true;
        self.activated_at = Some(now);
    }

    pub fn deactivate(&mut self, now: Timestamp) {
        self.is_active = false;
        self.deactivated_at = Some(now);
    }

    pub fn mark_deleted(&mut self, now: Timestamp) {
        self.deleted_at = Some(now);
    }
}

//! Trader - per-robot execution state machine
//!
//! A trader wraps one robot snapshot and the side of the round trip it is
//! waiting for. Deciding is pure; applying a fill mutates the snapshot the
//! same way the persisted row must change.

use robotrader_core::{Action, Quote, Robot, RobotId, Timestamp, TradeMode};

#[derive(Debug, Clone)]
pub struct Trader {
    robot: Robot,
    mode: TradeMode,
    withdrawn: bool,
}

impl Trader {
    /// New traders always start out buying
    pub fn new(robot: Robot) -> Self {
        Self {
            robot,
            mode: TradeMode::Buying,
            withdrawn: false,
        }
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn robot_id(&self) -> RobotId {
        self.robot.robot_id
    }

    pub fn mode(&self) -> TradeMode {
        self.mode
    }

    /// Whether `quote` triggers a fill in the current mode
    pub fn decide(&self, quote: &Quote) -> Option<Action> {
        match self.mode {
            TradeMode::Buying if self.robot.buy_price >= quote.buy_price => {
                Some(Action::Buy(quote.buy_price))
            }
            TradeMode::Selling if self.robot.sell_price <= quote.sell_price => {
                Some(Action::Sell(quote.sell_price))
            }
            _ => None,
        }
    }

    /// Apply a fill to the snapshot and flip the mode
    ///
    /// Returns false, leaving the trader untouched, when the action does not
    /// belong to the current mode.
    pub fn apply(&mut self, action: Action) -> bool {
        if action.required_mode() != self.mode {
            return false;
        }

        match action {
            Action::Buy(price) => {
                self.robot.fact_yield -= price;
            }
            Action::Sell(price) => {
                self.robot.fact_yield += price;
                self.robot.deals_count += 1;
            }
        }
        self.mode = self.mode.flipped();
        true
    }

    /// Decide and apply in one step
    pub fn on_quote(&mut self, quote: &Quote) -> Option<Action> {
        let action = self.decide(quote)?;
        self.apply(action).then_some(action)
    }

    /// Whether a scan stopped returning this robot
    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn
    }

    /// Mark the robot as no longer eligible to run
    ///
    /// The snapshot is left alone so a stale row is never written back.
    /// Returns false if the trader was already withdrawn.
    pub fn withdraw(&mut self) -> bool {
        !std::mem::replace(&mut self.withdrawn, true)
    }

    /// Terminal check: withdrawn by a scan, or finished by the robot's own
    /// lifecycle
    pub fn is_finished(&self, now: Timestamp) -> bool {
        self.withdrawn || self.robot.has_finished_at(now)
    }

    /// Replace the snapshot with a freshly scanned row
    ///
    /// Settings owned by the user (thresholds, plan window, activity and
    /// lifecycle timestamps) come from `robot`. The running totals are only
    /// ever written by this trader, so the in-memory values win: a scan that
    /// read the row before an in-flight write must not roll them back.
    pub fn refresh(&mut self, robot: Robot) {
        let fact_yield = self.robot.fact_yield;
        let deals_count = self.robot.deals_count;

        self.robot = robot;
        self.robot.fact_yield = fact_yield;
        self.robot.deals_count = deals_count;
        self.withdrawn = false;
    }
}

use serde::{Deserialize, Serialize};

use crate::values::Price;

/// Which side of the round trip a trader is waiting for
///
/// Every trader starts out `Buying`; each successful fill flips the mode,
/// so fills strictly alternate buy, sell, buy, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradeMode {
    #[default]
    Buying,
    Selling,
}

impl TradeMode {
    /// Returns the mode entered after a fill in this mode
    pub fn flipped(&self) -> Self {
        match self {
            TradeMode::Buying => TradeMode::Selling,
            TradeMode::Selling => TradeMode::Buying,
        }
    }
}

/// A fill triggered by a quote crossing a robot's threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy(Price),
    Sell(Price),
}

impl Action {
    pub fn price(&self) -> Price {
        match self {
            Action::Buy(price) | Action::Sell(price) => *price,
        }
    }

    /// The mode a trader must be in for this action to fire
    pub fn required_mode(&self) -> TradeMode {
        match self {
            Action::Buy(_) => TradeMode::Buying,
            Action::Sell(_) => TradeMode::Selling,
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::values::Price;

/// One price update from the feed for a single ticker
///
/// `buy_price` is what a robot pays to enter, `sell_price` is what it
/// receives when exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub buy_price: Price,
    pub sell_price: Price,
}

impl Quote {
    pub fn new(buy_price: Price, sell_price: Price) -> Self {
        Self {
            buy_price,
            sell_price,
        }
    }
}

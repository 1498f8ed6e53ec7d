mod quote;
mod robot;
mod trade_mode;

pub use quote::Quote;
pub use robot::{Robot, RobotId, UserId};
pub use trade_mode::{Action, TradeMode};

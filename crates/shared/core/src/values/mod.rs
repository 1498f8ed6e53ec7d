use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal so running yields accumulate exactly
pub type Price = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Market symbol a robot trades, e.g. `AAPL`
pub type Ticker = String;

//! Runner configuration, loaded from JSON

use crate::error::{Result, RunnerError};
use robotrader_core::{Price, Robot, Ticker};
use robotrader_engine::EngineConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub engine: EngineConfig,
    /// Robots written to the store before the engine starts; id 0 means
    /// "assign the next free id"
    pub robots: Vec<Robot>,
    /// Initial mid price per simulated ticker
    pub tickers: BTreeMap<Ticker, Price>,
    /// Pause between two quotes of one ticker (ms)
    pub quote_interval_ms: u64,
    /// Largest relative mid move per quote, e.g. 0.002 = 0.2%
    pub volatility: Decimal,
    /// Relative distance between buy and sell price
    pub spread: Decimal,
    /// Fixed seed for reproducible price walks
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let mut tickers = BTreeMap::new();
        tickers.insert("AAPL".to_string(), dec!(56));
        tickers.insert("MSFT".to_string(), dec!(300));

        Self {
            engine: EngineConfig::default(),
            robots: vec![
                Robot::new(0, 1, "AAPL", dec!(55.8), dec!(56.2)).with_active(true),
                Robot::new(0, 1, "MSFT", dec!(299), dec!(301)).with_active(true),
                Robot::new(0, 2, "AAPL", dec!(55), dec!(57)).with_active(true),
            ],
            tickers,
            quote_interval_ms: 500,
            volatility: dec!(0.002),
            spread: dec!(0.001),
            seed: None,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a JSON file; missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunnerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.quote_interval_ms == 0 {
            return Err(RunnerError::InvalidConfig(
                "quote_interval_ms must be positive".to_string(),
            ));
        }
        if self.volatility < Decimal::ZERO || self.volatility >= Decimal::ONE {
            return Err(RunnerError::InvalidConfig(format!(
                "volatility must be within [0, 1), got {}",
                self.volatility
            )));
        }
        if self.spread < Decimal::ZERO || self.spread >= Decimal::ONE {
            return Err(RunnerError::InvalidConfig(format!(
                "spread must be within [0, 1), got {}",
                self.spread
            )));
        }
        if let Some((ticker, _)) = self.tickers.iter().find(|(_, mid)| **mid <= Decimal::ZERO) {
            return Err(RunnerError::InvalidConfig(format!(
                "initial price of {} must be positive",
                ticker
            )));
        }
        Ok(())
    }

    pub fn quote_interval(&self) -> Duration {
        Duration::from_millis(self.quote_interval_ms)
    }
}

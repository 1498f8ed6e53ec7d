//! Engine errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Engine is not running")]
    Stopped,

    #[error("Engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

use robotrader_core::RobotId;
use thiserror::Error;

/// Errors surfaced by the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Robot not found: {0}")]
    NotFound(RobotId),

    #[error("Robot already exists: {0}")]
    AlreadyExists(RobotId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the price feed collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed connection failed: {0}")]
    Connection(String),

    #[error("Feed stream failed: {0}")]
    Stream(String),
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

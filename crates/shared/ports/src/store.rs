use async_trait::async_trait;
use robotrader_core::{Robot, RobotId, Timestamp};

use crate::error::StoreResult;

/// Port for robot persistence
///
/// Implementations own storage, transactions and schema. Every successful
/// write is expected to be forwarded to the notification collaborator by
/// the implementation itself; the engine never notifies directly.
#[async_trait]
pub trait RobotStore: Send + Sync {
    /// Insert a new robot row
    async fn create_robot(&self, robot: &Robot) -> StoreResult<()>;

    /// Overwrite the full robot row keyed by `robot.robot_id`
    ///
    /// Idempotent: writing the same snapshot twice leaves the same row.
    async fn update_robot(&self, robot: &Robot) -> StoreResult<()>;

    /// Robots that are not deleted and either active or inside their plan
    /// window as of `as_of`
    async fn robots_eligible_to_run(&self, as_of: Timestamp) -> StoreResult<Vec<Robot>>;

    /// Id to assign to the next created robot
    async fn next_robot_id(&self) -> StoreResult<RobotId>;
}

//! Bootstrap - store seeding and change reporting
//!
//! Handles setup before the engine starts:
//! - Writing the configured robots, assigning ids where none was given
//! - Reporting every robot change the store broadcasts

use crate::error::Result;
use log::{info, warn};
use robotrader_core::Robot;
use robotrader_gateway::LogNotifier;
use robotrader_ports::{RobotNotifier, RobotStore};
use tokio::sync::{broadcast, watch};

/// Create every seed robot in `store`, returning them with their final ids
pub async fn seed_robots(store: &dyn RobotStore, robots: Vec<Robot>) -> Result<Vec<Robot>> {
    let mut seeded = Vec::with_capacity(robots.len());

    for mut robot in robots {
        if robot.robot_id == 0 {
            robot.robot_id = store.next_robot_id().await?;
        }
        store.create_robot(&robot).await?;
        info!(
            "[{}] Seeded robot {} for user {}: buy <= {}, sell >= {}",
            robot.ticker, robot.robot_id, robot.owner_user_id, robot.buy_price, robot.sell_price
        );
        seeded.push(robot);
    }

    Ok(seeded)
}

/// Log every robot change until shutdown or until the sender goes away
pub async fn report_changes(
    mut changes: broadcast::Receiver<Robot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let reporter = LogNotifier;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = changes.recv() => match received {
                Ok(robot) => reporter.robot_changed(&robot),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Change report skipped {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

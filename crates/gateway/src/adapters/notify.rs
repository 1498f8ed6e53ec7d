//! Robot change notifiers

use log::{info, trace};
use robotrader_core::Robot;
use robotrader_ports::RobotNotifier;
use tokio::sync::broadcast;

/// Fan robot changes out to any number of in-process listeners
///
/// Sending never blocks. Listeners that fall behind lose the oldest
/// changes; with no listeners the change is dropped.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Robot>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Robot> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl RobotNotifier for BroadcastNotifier {
    fn robot_changed(&self, robot: &Robot) {
        if self.tx.send(robot.clone()).is_err() {
            trace!("No listeners for robot {} change", robot.robot_id);
        }
    }
}

/// Writes every change to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl RobotNotifier for LogNotifier {
    fn robot_changed(&self, robot: &Robot) {
        info!(
            "[{}] Robot {} changed: active={} deals={} yield={}",
            robot.ticker, robot.robot_id, robot.is_active, robot.deals_count, robot.fact_yield
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_every_listener_sees_change() {
        let notifier = BroadcastNotifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();
        assert_eq!(notifier.listener_count(), 2);

        let robot = Robot::new(1, 1, "AAPL", dec!(10), dec!(12));
        notifier.robot_changed(&robot);

        assert_eq!(first.recv().await.unwrap(), robot);
        assert_eq!(second.recv().await.unwrap(), robot);
    }

    #[test]
    fn test_change_without_listeners_is_dropped() {
        let notifier = BroadcastNotifier::default();
        notifier.robot_changed(&Robot::new(1, 1, "AAPL", dec!(10), dec!(12)));
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_log_notifier() {
        let _ = env_logger::try_init();
        LogNotifier.robot_changed(&Robot::new(1, 1, "AAPL", dec!(10), dec!(12)));
    }
}

use robotrader_core::Robot;

/// Port for downstream broadcast of robot changes
///
/// Best-effort: the caller gets no acknowledgement and must not block on
/// slow consumers.
pub trait RobotNotifier: Send + Sync {
    fn robot_changed(&self, robot: &Robot);
}

use robotrader_core::Timestamp;

/// Port for time abstraction
///
/// The engine never reads wall time directly, so tests can pin the
/// current time when checking plan windows:
/// - Real system time for production
/// - Manually advanced time for deterministic tests
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}

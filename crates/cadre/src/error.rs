//! Error types for tasks and the virtual clock

use thiserror::Error;

/// Failure captured from a scheduled unit of work.
///
/// A panic inside scheduled work does not propagate synchronously; it is
/// stored on the task and surfaced as an `Err` from `wait`/`wait_result`,
/// on that task and on every task downstream of it in the continuation chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task's work panicked; the payload message is preserved
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task completed without producing a value (internal invariant
    /// violation for typed handles; not expected in normal operation)
    #[error("task produced no result")]
    NoResult,
}

/// Errors raised by [`ManualClock`](crate::time::ManualClock) misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// `schedule_after`/`schedule_at`/`advance` called with no bound
    /// scheduler; there is no way to dispatch the eventual action
    #[error("no scheduler bound to this clock")]
    NoSchedulerBound,
}

//! Cadre task-scheduling runtime
//!
//! This crate provides a cooperative/parallel task-scheduling core:
//! - **Tasks**: completable units of work with chained continuations
//!   (`task` module)
//! - **Schedulers**: one contract, two runners — cooperative
//!   [`CurrentThreadRunner`] and thread-pool [`ParallelRunner`]
//!   (`scheduler` module)
//! - **Virtual time**: [`ManualClock`] for deterministic timer-based tests
//!   (`time` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use cadre::{ParallelRunner, ScheduleExt};
//! use std::sync::Arc;
//!
//! let runner = Arc::new(ParallelRunner::new());
//! let task = runner.schedule_fn(|| 20);
//! assert_eq!(task.wait_result().unwrap(), 20);
//! runner.wait_idle();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Error types for tasks and the virtual clock
pub mod error;

/// Scheduler contract and runner implementations
pub mod scheduler;

/// Synchronization primitives shared by the runners
pub mod sync;

/// Task structure, completion state, and the continuation chain
pub mod task;

/// Virtual time for deterministic tests
pub mod time;

pub use error::{ClockError, TaskError};
pub use scheduler::{
    CurrentThreadRunner, ParallelRunner, ScheduleExt, Scheduler, SchedulerStats,
};
pub use sync::Monitor;
pub use task::{ActionFn, Task, TaskCore, TaskId, TaskState, TaskValue, ValueFn, ValueTask, Work};
pub use time::{Clock, ManualClock};

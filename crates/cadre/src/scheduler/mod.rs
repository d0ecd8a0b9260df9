//! Scheduler contract and the two runner implementations
//!
//! Two structurally different execution strategies present one contract:
//! [`CurrentThreadRunner`] (cooperative, drains on the calling thread inside
//! `wait_idle`) and [`ParallelRunner`] (thread-pool-backed, executes as soon
//! as work is submitted). Tasks hold a `Weak<dyn Scheduler>` back-pointer,
//! so the scheduling entry points live on `Arc`ed schedulers via
//! [`ScheduleExt`].

mod current_thread;
mod parallel;
mod worker;

pub use current_thread::CurrentThreadRunner;
pub use parallel::ParallelRunner;

use crate::task::{ActionFn, Task, TaskCore, TaskValue, ValueTask, Work};
use std::sync::Arc;

/// The scheduler contract shared by both runners.
///
/// `submit` accounts a task as scheduled and enqueues it; `note_paused` /
/// `promote` track continuations parked on a not-yet-completed parent and
/// their hand-off into the scheduled set. `wait_idle` blocks the caller
/// until the scheduled count reaches zero, including work transitively
/// scheduled by running tasks; with nothing outstanding it is a no-op.
pub trait Scheduler: Send + Sync {
    /// Enqueue `task` for execution (scheduled count +1)
    fn submit(&self, task: Arc<TaskCore>);

    /// Account for a continuation registered on a not-yet-completed parent
    fn note_paused(&self);

    /// Move a previously-paused task into the scheduled set (paused -1,
    /// scheduled +1) and enqueue it
    fn promote(&self, task: Arc<TaskCore>);

    /// Number of tasks submitted but not yet finished
    fn scheduled_task_count(&self) -> usize;

    /// Number of continuations parked on not-yet-completed parents
    fn paused_task_count(&self) -> usize;

    /// Block until the scheduled count reaches zero
    fn wait_idle(&self);

    /// Hook for cooperative runners: run queued work on the calling thread
    /// until `task` finishes or the queue drains. Blocking runners leave
    /// this a no-op and rely on the task monitor instead.
    fn drive_task(&self, task: &Arc<TaskCore>) {
        let _ = task;
    }
}

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total tasks submitted
    pub tasks_started: u64,
    /// Total tasks finished (completed or failed)
    pub tasks_completed: u64,
}

/// Scheduling entry points, implemented for `Arc<dyn Scheduler>` and every
/// `Arc<impl Scheduler>`.
///
/// The `Option`-taking forms encode the documented null contract: an absent
/// work item is a silent no-op returning `None` that changes no counters.
pub trait ScheduleExt {
    /// Schedule a no-result action; returns its handle
    fn schedule<F>(&self, action: F) -> Task
    where
        F: FnOnce() + Send + 'static;

    /// Schedule a value-returning function; returns its typed handle
    fn schedule_fn<T, F>(&self, func: F) -> ValueTask<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static;

    /// Schedule an optional action. `None` is a documented no-op returning
    /// `None` with no counter changes.
    fn schedule_action(&self, action: Option<ActionFn>) -> Option<Task>;

    /// Schedule an optional value-returning function. Same `None` contract
    /// as [`schedule_action`](Self::schedule_action).
    #[allow(clippy::type_complexity)]
    fn schedule_value<T>(
        &self,
        func: Option<Box<dyn FnOnce() -> T + Send + 'static>>,
    ) -> Option<ValueTask<T>>
    where
        T: Send + Sync + 'static;
}

fn spawn(scheduler: &Arc<dyn Scheduler>, work: Work) -> Arc<TaskCore> {
    let core = TaskCore::new(Some(work), Arc::downgrade(scheduler));
    scheduler.submit(Arc::clone(&core));
    core
}

impl ScheduleExt for Arc<dyn Scheduler> {
    fn schedule<F>(&self, action: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        Task::from_core(spawn(self, Work::Action(Box::new(action))))
    }

    fn schedule_fn<T, F>(&self, func: F) -> ValueTask<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let work = Work::Value(Box::new(move || Arc::new(func()) as TaskValue));
        ValueTask::from_core(spawn(self, work))
    }

    fn schedule_action(&self, action: Option<ActionFn>) -> Option<Task> {
        let action = action?;
        Some(Task::from_core(spawn(self, Work::Action(action))))
    }

    fn schedule_value<T>(
        &self,
        func: Option<Box<dyn FnOnce() -> T + Send + 'static>>,
    ) -> Option<ValueTask<T>>
    where
        T: Send + Sync + 'static,
    {
        let func = func?;
        let work = Work::Value(Box::new(move || Arc::new(func()) as TaskValue));
        Some(ValueTask::from_core(spawn(self, work)))
    }
}

impl<S: Scheduler + 'static> ScheduleExt for Arc<S> {
    fn schedule<F>(&self, action: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        let this: Arc<dyn Scheduler> = Arc::clone(self) as Arc<dyn Scheduler>;
        this.schedule(action)
    }

    fn schedule_fn<T, F>(&self, func: F) -> ValueTask<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let this: Arc<dyn Scheduler> = Arc::clone(self) as Arc<dyn Scheduler>;
        this.schedule_fn(func)
    }

    fn schedule_action(&self, action: Option<ActionFn>) -> Option<Task> {
        let this: Arc<dyn Scheduler> = Arc::clone(self) as Arc<dyn Scheduler>;
        this.schedule_action(action)
    }

    fn schedule_value<T>(
        &self,
        func: Option<Box<dyn FnOnce() -> T + Send + 'static>>,
    ) -> Option<ValueTask<T>>
    where
        T: Send + Sync + 'static,
    {
        let this: Arc<dyn Scheduler> = Arc::clone(self) as Arc<dyn Scheduler>;
        this.schedule_value(func)
    }
}

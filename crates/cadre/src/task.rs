//! Task structure, completion state, and the continuation chain
//!
//! A task is a one-shot unit of work plus its completion state. Callers hold
//! cheap [`Task`]/[`ValueTask`] handles; the shared [`TaskCore`] keeps every
//! mutable field behind a single per-task [`Monitor`], so the completion
//! protocol and continuation registration cannot race.

use crate::error::TaskError;
use crate::scheduler::Scheduler;
use crate::sync::Monitor;
use parking_lot::Mutex;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A no-result unit of work
pub type ActionFn = Box<dyn FnOnce() + Send + 'static>;

/// Type-erased result value stored on a completed task
pub type TaskValue = Arc<dyn Any + Send + Sync>;

/// A value-producing unit of work, already type-erased
pub type ValueFn = Box<dyn FnOnce() -> TaskValue + Send + 'static>;

/// Work item carried by a task
pub enum Work {
    /// Runs for its side effects only
    Action(ActionFn),
    /// Produces a result exposed through a typed handle
    Value(ValueFn),
}

/// Unique identifier for a task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a task
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Just created, not yet handed to a scheduler
    NotRun,
    /// Registered as a continuation on a not-yet-completed parent
    Paused,
    /// Enqueued on a scheduler, waiting to execute
    Scheduled,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with a captured failure
    Failed,
}

/// A continuation registered on a not-yet-completed parent.
///
/// The parent's continuation list is the only strong link; the continuation
/// task holds no reference back to the parent, so no cycle can form.
struct Continuation {
    task: Arc<TaskCore>,
    scheduler: Weak<dyn Scheduler>,
    forwards_result: bool,
}

/// Mutable task fields, guarded by the per-task monitor
struct TaskBody {
    state: TaskState,
    result: Option<TaskValue>,
    failure: Option<TaskError>,
    /// Outcome injected by a completed parent before this task runs:
    /// an inherited failure, or a forwarded result for proxy tasks
    preset: Option<Result<Option<TaskValue>, TaskError>>,
    continuations: Vec<Continuation>,
}

/// Shared task state behind every [`Task`]/[`ValueTask`] handle.
///
/// Scheduler implementations receive `Arc<TaskCore>` from `submit`/`promote`
/// and call [`execute`](Self::execute) when they decide the task should run.
pub struct TaskCore {
    id: TaskId,
    owner: Weak<dyn Scheduler>,
    /// Taken exactly once, by the runner that executes the task
    work: Mutex<Option<Work>>,
    body: Monitor<TaskBody>,
}

impl TaskCore {
    pub(crate) fn new(work: Option<Work>, owner: Weak<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::new(),
            owner,
            work: Mutex::new(work),
            body: Monitor::new(TaskBody {
                state: TaskState::NotRun,
                result: None,
                failure: None,
                preset: None,
                continuations: Vec::new(),
            }),
        })
    }

    /// Get the task's unique ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        self.body.lock().state
    }

    /// Whether the task has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        matches!(self.state(), TaskState::Completed | TaskState::Failed)
    }

    /// The scheduler this task was created on, if still alive
    pub fn owner(&self) -> Option<Arc<dyn Scheduler>> {
        self.owner.upgrade()
    }

    /// Mark the task as enqueued. Called by scheduler `submit` impls.
    pub fn mark_scheduled(&self) {
        self.body.lock().state = TaskState::Scheduled;
    }

    pub(crate) fn mark_paused(&self) {
        self.body.lock().state = TaskState::Paused;
    }

    /// Run the task's work on the calling thread.
    ///
    /// Panics inside the work are caught and stored as a failure; an outcome
    /// injected by a failed or proxied parent short-circuits the work
    /// entirely. On finish the continuation list is drained in registration
    /// order and each continuation is handed to its designated scheduler.
    pub fn execute(self: &Arc<Self>) {
        let preset = {
            let mut body = self.body.lock();
            body.state = TaskState::Running;
            body.preset.take()
        };

        let outcome = match preset {
            Some(outcome) => outcome,
            None => {
                let work = self.work.lock().take();
                match work {
                    // Barrier/no-op task (e.g. the clock's advance marker)
                    None => Ok(None),
                    Some(Work::Action(f)) => panic::catch_unwind(AssertUnwindSafe(f))
                        .map(|_| None)
                        .map_err(|payload| TaskError::Panicked(panic_message(payload))),
                    Some(Work::Value(f)) => panic::catch_unwind(AssertUnwindSafe(f))
                        .map(Some)
                        .map_err(|payload| TaskError::Panicked(panic_message(payload))),
                }
            }
        };

        self.finish(outcome);
    }

    /// Store the outcome, signal waiters, and fire continuations.
    fn finish(self: &Arc<Self>, outcome: Result<Option<TaskValue>, TaskError>) {
        let (fired, failure, result) = {
            let mut body = self.body.lock();
            match outcome {
                Ok(value) => {
                    body.state = TaskState::Completed;
                    body.result = value;
                }
                Err(err) => {
                    body.state = TaskState::Failed;
                    body.failure = Some(err);
                }
            }
            (
                std::mem::take(&mut body.continuations),
                body.failure.clone(),
                body.result.clone(),
            )
        };
        self.body.notify_all();

        for cont in fired {
            let Some(scheduler) = cont.scheduler.upgrade() else {
                // Designated scheduler is gone; the continuation is dropped
                continue;
            };
            {
                let mut body = cont.task.body.lock();
                if let Some(err) = &failure {
                    body.preset = Some(Err(err.clone()));
                } else if cont.forwards_result {
                    body.preset = Some(Ok(result.clone()));
                }
            }
            scheduler.promote(cont.task);
        }
    }

    /// Register a continuation on this task, to run on `target` once the
    /// task completes. If the task already finished, the continuation is
    /// submitted immediately (scheduled count +1); otherwise it is appended
    /// to the continuation list and counted as paused on `target`.
    fn register_continuation(
        self: &Arc<Self>,
        target: &Arc<dyn Scheduler>,
        work: Option<Work>,
        forwards_result: bool,
    ) -> Arc<TaskCore> {
        let cont = TaskCore::new(work, Arc::downgrade(target));

        let already_finished = {
            let mut body = self.body.lock();
            match body.state {
                TaskState::Completed | TaskState::Failed => {
                    let mut cont_body = cont.body.lock();
                    if let Some(err) = &body.failure {
                        cont_body.preset = Some(Err(err.clone()));
                    } else if forwards_result {
                        cont_body.preset = Some(Ok(body.result.clone()));
                    }
                    true
                }
                _ => {
                    // Paused state and count must be settled before the
                    // continuation becomes reachable through the parent:
                    // completion may promote it the moment the lock drops
                    cont.mark_paused();
                    target.note_paused();
                    body.continuations.push(Continuation {
                        task: Arc::clone(&cont),
                        scheduler: Arc::downgrade(target),
                        forwards_result,
                    });
                    false
                }
            }
        };

        if already_finished {
            target.submit(Arc::clone(&cont));
        }
        cont
    }

    /// Block until the task finishes. On a cooperative owner this first
    /// drives the owner's queue on the calling thread.
    fn wait_finished(self: &Arc<Self>) {
        if let Some(owner) = self.owner() {
            owner.drive_task(self);
        }
        let mut body = self.body.lock();
        self.body.wait_until(&mut body, |b| {
            matches!(b.state, TaskState::Completed | TaskState::Failed)
        });
    }

    fn failure(&self) -> Option<TaskError> {
        self.body.lock().failure.clone()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Handle to a scheduled no-result task.
///
/// Cheap to clone; all clones observe the same completion state.
#[derive(Clone)]
pub struct Task {
    core: Arc<TaskCore>,
}

impl Task {
    pub(crate) fn from_core(core: Arc<TaskCore>) -> Self {
        Self { core }
    }

    /// Get the task's unique ID
    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    /// Whether the task has finished (successfully or with a failure)
    pub fn is_completed(&self) -> bool {
        self.core.is_finished()
    }

    /// Whether the task finished with a captured failure
    pub fn is_failed(&self) -> bool {
        self.core.state() == TaskState::Failed
    }

    /// Register `action` to run on this task's own scheduler after it
    /// completes.
    ///
    /// An absent action is a silent no-op returning `None`; no counter
    /// changes. If the task already completed, the continuation is submitted
    /// immediately; otherwise it is parked as a paused task until completion.
    /// Returns `None` as well when the owning scheduler no longer exists.
    pub fn then(&self, action: Option<ActionFn>) -> Option<Task> {
        let action = action?;
        let owner = self.core.owner()?;
        Some(Task::from_core(self.core.register_continuation(
            &owner,
            Some(Work::Action(action)),
            false,
        )))
    }

    /// Convenience form of [`then`](Self::then) taking a plain closure
    pub fn then_run<F>(&self, action: F) -> Option<Task>
    where
        F: FnOnce() + Send + 'static,
    {
        self.then(Some(Box::new(action)))
    }

    /// Like [`then`](Self::then), but the continuation runs on `scheduler`
    /// instead of this task's own scheduler when it fires.
    pub fn then_on(&self, scheduler: Arc<dyn Scheduler>, action: Option<ActionFn>) -> Option<Task> {
        let action = action?;
        Some(Task::from_core(self.core.register_continuation(
            &scheduler,
            Some(Work::Action(action)),
            false,
        )))
    }

    /// Block until the task finishes, surfacing any captured failure.
    ///
    /// Waiting on an already-finished task returns immediately.
    pub fn wait(&self) -> Result<(), TaskError> {
        self.core.wait_finished();
        match self.core.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Block until the task finishes or `timeout` elapses. Returns whether
    /// the task finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if let Some(owner) = self.core.owner() {
            owner.drive_task(&self.core);
        }
        let mut body = self.core.body.lock();
        self.core.body.wait_until_timeout(
            &mut body,
            |b| matches!(b.state, TaskState::Completed | TaskState::Failed),
            timeout,
        )
    }

    pub(crate) fn core(&self) -> &Arc<TaskCore> {
        &self.core
    }
}

/// Handle to a value-returning task (a scheduled function).
///
/// The result is stored type-erased on the shared core; this handle restores
/// the type on retrieval. Repeated [`wait_result`](Self::wait_result) calls
/// return the cached value without re-running the function.
pub struct ValueTask<T> {
    core: Arc<TaskCore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ValueTask<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _marker: PhantomData,
        }
    }
}

impl<T> ValueTask<T> {
    pub(crate) fn from_core(core: Arc<TaskCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    /// Get the task's unique ID
    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    /// Whether the task has finished (successfully or with a failure)
    pub fn is_completed(&self) -> bool {
        self.core.is_finished()
    }

    /// Whether the task finished with a captured failure
    pub fn is_failed(&self) -> bool {
        self.core.state() == TaskState::Failed
    }

    /// Register `action` to run on this task's own scheduler after it
    /// completes. Same contract as [`Task::then`].
    pub fn then(&self, action: Option<ActionFn>) -> Option<Task> {
        let action = action?;
        let owner = self.core.owner()?;
        Some(Task::from_core(self.core.register_continuation(
            &owner,
            Some(Work::Action(action)),
            false,
        )))
    }

    /// Convenience form of [`then`](Self::then) taking a plain closure
    pub fn then_run<F>(&self, action: F) -> Option<Task>
    where
        F: FnOnce() + Send + 'static,
    {
        self.then(Some(Box::new(action)))
    }

    /// Like [`then`](Self::then), but the continuation runs on `scheduler`
    /// when it fires.
    pub fn then_on(&self, scheduler: Arc<dyn Scheduler>, action: Option<ActionFn>) -> Option<Task> {
        let action = action?;
        Some(Task::from_core(self.core.register_continuation(
            &scheduler,
            Some(Work::Action(action)),
            false,
        )))
    }

    /// "Move to scheduler" adapter: returns a proxy task that re-exposes
    /// this task's result (or failure) on `scheduler` once it completes.
    ///
    /// Passing the task's own scheduler returns the *same* handle, no new
    /// task. Passing `None` returns `None` silently — an inconsistency
    /// inherited from the original contract, where every other absent
    /// argument on a scheduler entry point reports a precondition instead.
    pub fn then_on_scheduler(&self, scheduler: Option<Arc<dyn Scheduler>>) -> Option<ValueTask<T>> {
        let scheduler = scheduler?;
        if let Some(owner) = self.core.owner() {
            // Thin-pointer comparison: vtable pointers may differ for the
            // same scheduler across coercion sites
            if Arc::as_ptr(&owner) as *const () == Arc::as_ptr(&scheduler) as *const () {
                return Some(self.clone());
            }
        }
        Some(ValueTask::from_core(self.core.register_continuation(
            &scheduler,
            None,
            true,
        )))
    }

    /// Block until the task finishes, ignoring its value. Surfaces captured
    /// failures like [`Task::wait`].
    pub fn wait(&self) -> Result<(), TaskError> {
        self.core.wait_finished();
        match self.core.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) fn core(&self) -> &Arc<TaskCore> {
        &self.core
    }
}

impl<T: Clone + Send + Sync + 'static> ValueTask<T> {
    /// Block until the scheduler has executed the function, then return the
    /// captured result, or the captured failure as `Err`.
    ///
    /// Calling this again after completion returns the cached result without
    /// re-running the function.
    pub fn wait_result(&self) -> Result<T, TaskError> {
        self.core.wait_finished();
        let body = self.core.body.lock();
        if let Some(err) = &body.failure {
            return Err(err.clone());
        }
        body.result
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .ok_or(TaskError::NoResult)
    }

    /// Non-blocking probe: the result if the task completed successfully
    pub fn try_result(&self) -> Option<T> {
        let body = self.core.body.lock();
        match body.state {
            TaskState::Completed => body
                .result
                .as_ref()
                .and_then(|value| value.downcast_ref::<T>())
                .cloned(),
            _ => None,
        }
    }
}

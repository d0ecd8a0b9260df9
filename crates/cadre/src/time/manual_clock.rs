//! Manually-advanced clock bound to a scheduler
//!
//! A `ManualClock` substitutes for wall-clock time: `schedule_after` /
//! `schedule_at` register pending entries, and `advance` moves current time
//! forward and hands every due entry to the bound scheduler. Entries due at
//! the same instant fire in registration order (a monotonic sequence number
//! breaks ties), so time-based tests stay deterministic even when the bound
//! scheduler is parallel.

use crate::error::ClockError;
use crate::scheduler::Scheduler;
use crate::task::{ActionFn, Task, TaskCore, Work};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A time source that can schedule actions for later execution
pub trait Clock: Send + Sync {
    /// Current time according to this clock
    fn now(&self) -> SystemTime;

    /// Schedule `action` to run `delay` after the current time
    fn schedule_after(&self, delay: Duration, action: ActionFn) -> Result<Task, ClockError>;

    /// Schedule `action` to run at the absolute instant `due`
    fn schedule_at(&self, due: SystemTime, action: ActionFn) -> Result<Task, ClockError>;
}

/// Entry in the pending heap
struct ClockEntry {
    due: SystemTime,
    /// Registration order; breaks ties between entries due at the same instant
    seq: u64,
    task: Arc<TaskCore>,
}

// Reverse ordering on (due, seq) for a min-heap: earliest entry first,
// registration order among equals
impl Ord for ClockEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ClockEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ClockEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ClockEntry {}

struct ClockState {
    current: SystemTime,
    entries: BinaryHeap<ClockEntry>,
}

/// Virtual time source bound to a scheduler.
///
/// Time starts at the Unix epoch unless constructed with
/// [`starting_at`](Self::starting_at), and only moves when
/// [`advance`](Self::advance) is called. Scheduling or advancing with no
/// bound scheduler is a usage error reported immediately, since there would
/// be no way to dispatch the eventual action.
pub struct ManualClock {
    state: Mutex<ClockState>,
    scheduler: Mutex<Option<Arc<dyn Scheduler>>>,
    next_seq: AtomicU64,
}

impl ManualClock {
    /// Create an unbound clock starting at the Unix epoch
    pub fn new() -> Self {
        Self::starting_at(UNIX_EPOCH)
    }

    /// Create an unbound clock starting at `start`
    pub fn starting_at(start: SystemTime) -> Self {
        Self {
            state: Mutex::new(ClockState {
                current: start,
                entries: BinaryHeap::new(),
            }),
            scheduler: Mutex::new(None),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Create a clock starting at the Unix epoch, bound to `scheduler`
    pub fn bound_to(scheduler: Arc<dyn Scheduler>) -> Self {
        let clock = Self::new();
        clock.bind(scheduler);
        clock
    }

    /// Bind the scheduler that due entries are handed to
    pub fn bind(&self, scheduler: Arc<dyn Scheduler>) {
        *self.scheduler.lock() = Some(scheduler);
    }

    /// The bound scheduler, if any
    pub fn bound_scheduler(&self) -> Option<Arc<dyn Scheduler>> {
        self.scheduler.lock().clone()
    }

    fn require_scheduler(&self) -> Result<Arc<dyn Scheduler>, ClockError> {
        self.bound_scheduler().ok_or(ClockError::NoSchedulerBound)
    }

    fn register(&self, due: SystemTime, action: ActionFn) -> Result<Task, ClockError> {
        let scheduler = self.require_scheduler()?;
        let task = TaskCore::new(Some(Work::Action(action)), Arc::downgrade(&scheduler));
        task.mark_paused();

        let mut state = self.state.lock();
        state.entries.push(ClockEntry {
            due,
            seq: self.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            task: Arc::clone(&task),
        });
        Ok(Task::from_core(task))
    }

    /// Convenience form of [`Clock::schedule_after`] taking a plain closure
    pub fn schedule_after_fn<F>(&self, delay: Duration, action: F) -> Result<Task, ClockError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_after(delay, Box::new(action))
    }

    /// Move current time forward by `delta` and hand every due entry to the
    /// bound scheduler, in ascending `(due, seq)` order.
    ///
    /// Returns a no-op barrier task submitted after the fired batch; with a
    /// FIFO-draining scheduler, waiting on it guarantees the batch has run.
    /// `advance` itself never waits for fired entries — callers who need
    /// that also `wait_idle` the bound scheduler.
    pub fn advance(&self, delta: Duration) -> Result<Task, ClockError> {
        let scheduler = self.require_scheduler()?;

        let due_tasks = {
            let mut state = self.state.lock();
            state.current += delta;

            let mut due = Vec::new();
            loop {
                match state.entries.peek() {
                    Some(entry) if entry.due <= state.current => {}
                    _ => break,
                }
                if let Some(entry) = state.entries.pop() {
                    due.push(entry.task);
                }
            }
            due
        };

        for task in due_tasks {
            scheduler.submit(task);
        }

        let barrier = TaskCore::new(None, Arc::downgrade(&scheduler));
        scheduler.submit(Arc::clone(&barrier));
        Ok(Task::from_core(barrier))
    }

    /// Number of registered entries not yet due
    pub fn paused_task_count(&self) -> usize {
        self.state.lock().entries.len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.state.lock().current
    }

    fn schedule_after(&self, delay: Duration, action: ActionFn) -> Result<Task, ClockError> {
        let due = self.state.lock().current + delay;
        self.register(due, action)
    }

    fn schedule_at(&self, due: SystemTime, action: ActionFn) -> Result<Task, ClockError> {
        self.register(due, action)
    }
}

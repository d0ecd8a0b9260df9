//! Cooperative single-thread runner
//!
//! Scheduling only enqueues; execution happens entirely inside `wait_idle`
//! (or a task-level `wait`), on the calling thread. The drain loop keeps
//! popping the head of the queue rather than iterating a snapshot, so work
//! enqueued *by* running work is picked up in the same call. Execution
//! order is strict FIFO over the dynamic queue.

use crate::scheduler::{Scheduler, SchedulerStats};
use crate::task::TaskCore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cooperative, single-thread scheduler.
///
/// The queue sits behind a mutex only because cross-scheduler continuations
/// may enqueue from another thread; execution itself is single-threaded by
/// construction, so task state never sees two concurrent writers here.
pub struct CurrentThreadRunner {
    queue: Mutex<VecDeque<Arc<TaskCore>>>,
    pending: AtomicUsize,
    paused: AtomicUsize,
    tasks_started: AtomicU64,
    tasks_completed: AtomicU64,
}

impl CurrentThreadRunner {
    /// Create a new runner with an empty queue
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            pending: AtomicUsize::new(0),
            paused: AtomicUsize::new(0),
            tasks_started: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
        }
    }

    /// Point-in-time counters
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }

    /// Pop and run the head of the queue. Returns false when the queue was
    /// empty.
    fn run_one(&self) -> bool {
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task.execute();
                self.pending.fetch_sub(1, Ordering::AcqRel);
                self.tasks_completed.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl Default for CurrentThreadRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for CurrentThreadRunner {
    fn submit(&self, task: Arc<TaskCore>) {
        task.mark_scheduled();
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push_back(task);
    }

    fn note_paused(&self) {
        self.paused.fetch_add(1, Ordering::AcqRel);
    }

    fn promote(&self, task: Arc<TaskCore>) {
        self.paused.fetch_sub(1, Ordering::AcqRel);
        self.submit(task);
    }

    fn scheduled_task_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn paused_task_count(&self) -> usize {
        self.paused.load(Ordering::Acquire)
    }

    fn wait_idle(&self) {
        while self.run_one() {}
    }

    fn drive_task(&self, task: &Arc<TaskCore>) {
        while !task.is_finished() && self.run_one() {}
    }
}

//! Thread-pool-backed runner
//!
//! `submit` pushes to a global injector and worker threads pick work up
//! immediately; independent tasks may run concurrently and complete in any
//! order. Task state transitions and continuation draining happen under the
//! per-task monitor, so a continuation registered concurrently with
//! completion is neither lost nor double-fired. `wait_idle` blocks on a
//! pending-count monitor that workers notify when the count reaches zero.

use crate::scheduler::worker::Worker;
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::sync::Monitor;
use crate::task::TaskCore;
use crossbeam_deque::{Injector, Worker as WorkerDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared between the runner handle and its worker threads
pub(crate) struct Shared {
    /// Global submission queue; workers also steal from each other
    pub(crate) injector: Injector<Arc<TaskCore>>,
    /// Tasks submitted but not yet finished; waiters block on the monitor
    pub(crate) pending: Monitor<usize>,
    pub(crate) paused: AtomicUsize,
    pub(crate) tasks_started: AtomicU64,
    pub(crate) tasks_completed: AtomicU64,
}

impl Shared {
    /// Called by a worker after a task finished executing
    pub(crate) fn task_done(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.pending.notify_all();
        }
    }
}

/// Thread-pool scheduler with work stealing between its workers.
///
/// Workers shut down when the runner is dropped; tasks still queued at that
/// point never run, so keep the runner alive while waiters exist.
pub struct ParallelRunner {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
}

impl ParallelRunner {
    /// Create a runner with one worker per CPU core
    pub fn new() -> Self {
        Self::with_workers(0)
    }

    /// Create a runner with `count` workers; 0 means the number of CPU cores
    pub fn with_workers(count: usize) -> Self {
        let count = if count == 0 { num_cpus::get() } else { count };

        let shared = Arc::new(Shared {
            injector: Injector::new(),
            pending: Monitor::new(0),
            paused: AtomicUsize::new(0),
            tasks_started: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
        });

        let deques: Vec<WorkerDeque<Arc<TaskCore>>> =
            (0..count).map(|_| WorkerDeque::new_lifo()).collect();
        let stealers: Vec<_> = deques.iter().map(|d| d.stealer()).collect();

        let mut workers = Vec::with_capacity(count);
        for (id, local) in deques.into_iter().enumerate() {
            let others = stealers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != id)
                .map(|(_, s)| s.clone())
                .collect();
            workers.push(Worker::spawn(id, local, others, Arc::clone(&shared)));
        }

        Self { shared, workers }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Point-in-time counters
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            tasks_started: self.shared.tasks_started.load(Ordering::Relaxed),
            tasks_completed: self.shared.tasks_completed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ParallelRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ParallelRunner {
    fn submit(&self, task: Arc<TaskCore>) {
        task.mark_scheduled();
        self.shared.tasks_started.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.shared.pending.lock();
            *pending += 1;
        }
        self.shared.injector.push(task);
    }

    fn note_paused(&self) {
        self.shared.paused.fetch_add(1, Ordering::AcqRel);
    }

    fn promote(&self, task: Arc<TaskCore>) {
        self.shared.paused.fetch_sub(1, Ordering::AcqRel);
        self.submit(task);
    }

    fn scheduled_task_count(&self) -> usize {
        *self.shared.pending.lock()
    }

    fn paused_task_count(&self) -> usize {
        self.shared.paused.load(Ordering::Acquire)
    }

    fn wait_idle(&self) {
        let mut pending = self.shared.pending.lock();
        self.shared.pending.wait_until(&mut pending, |count| *count == 0);
    }
}

impl Drop for ParallelRunner {
    fn drop(&mut self) {
        // Signal every worker before joining any, so they wind down together
        for worker in &self.workers {
            worker.signal_shutdown();
        }
        for worker in &mut self.workers {
            worker.stop();
        }
    }
}

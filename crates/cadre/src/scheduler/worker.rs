//! Worker threads for the parallel runner
//!
//! Workers pop from their local deque first, then steal from a random
//! victim, then fall back to the global injector. An idle worker sleeps
//! briefly instead of spinning.

use crate::scheduler::parallel::Shared;
use crate::task::TaskCore;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A single worker thread of the parallel runner
pub(crate) struct Worker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    /// Spawn the worker thread with its local deque and the stealers of its
    /// peers
    pub(crate) fn spawn(
        id: usize,
        local: WorkerDeque<Arc<TaskCore>>,
        stealers: Vec<Stealer<Arc<TaskCore>>>,
        shared: Arc<Shared>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name(format!("cadre-worker-{}", id))
            .spawn(move || run_loop(id, local, stealers, shared, flag))
            .expect("failed to spawn worker thread");

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Ask the worker to exit after its current task
    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Signal and join the worker thread
    pub(crate) fn stop(&mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    id: usize,
    local: WorkerDeque<Arc<TaskCore>>,
    stealers: Vec<Stealer<Arc<TaskCore>>>,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let task = match find_work(&local, &stealers, &shared.injector) {
            Some(task) => task,
            None => {
                // No work anywhere; back off instead of busy-waiting
                thread::sleep(Duration::from_micros(100));
                continue;
            }
        };

        task.execute();
        shared.task_done();
    }

    #[cfg(debug_assertions)]
    eprintln!("Worker {} shutting down", id);
}

/// Find work: local pop, then steal from peers, then the global injector
fn find_work(
    local: &WorkerDeque<Arc<TaskCore>>,
    stealers: &[Stealer<Arc<TaskCore>>],
    injector: &Injector<Arc<TaskCore>>,
) -> Option<Arc<TaskCore>> {
    if let Some(task) = local.pop() {
        return Some(task);
    }

    loop {
        if let Some(task) = steal_from_peers(stealers) {
            return Some(task);
        }

        match injector.steal_batch_and_pop(local) {
            Steal::Success(task) => return Some(task),
            Steal::Empty => break,
            Steal::Retry => continue,
        }
    }

    None
}

/// Steal from peers, starting at a random victim for load balancing
fn steal_from_peers(stealers: &[Stealer<Arc<TaskCore>>]) -> Option<Arc<TaskCore>> {
    use rand::Rng;

    if stealers.is_empty() {
        return None;
    }

    let start = rand::thread_rng().gen_range(0..stealers.len());
    for i in 0..stealers.len() {
        let stealer = &stealers[(start + i) % stealers.len()];
        loop {
            match stealer.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }

    None
}

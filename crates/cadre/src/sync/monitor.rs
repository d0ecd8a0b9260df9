//! Critical-section lock with condition waiting
//!
//! A `Monitor<T>` pairs a mutex-guarded value with a condition variable.
//! Waiting releases the lock, blocks, and re-acquires atomically on wake,
//! which is what the parallel runner's `wait`/`wait_result` paths rely on to
//! close the race between "check completion" and "register continuation".

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A mutex-guarded value plus a condition variable.
///
/// Lock release is scope-guaranteed by the returned guard on all exit paths,
/// including panics. At most one holder at a time; waiters are woken in
/// FIFO-or-better order by `parking_lot`.
pub struct Monitor<T> {
    state: Mutex<T>,
    condvar: Condvar,
}

impl<T> Monitor<T> {
    /// Create a new monitor around `value`
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    /// Acquire the lock
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock()
    }

    /// Block until `pred` returns true, releasing the lock while waiting.
    ///
    /// The predicate is checked before the first wait and after every wake,
    /// always with the lock held.
    pub fn wait_until(&self, guard: &mut MutexGuard<'_, T>, mut pred: impl FnMut(&T) -> bool) {
        while !pred(guard) {
            self.condvar.wait(guard);
        }
    }

    /// Like [`wait_until`](Self::wait_until) with an upper bound on total
    /// wait time. Returns whether the predicate held when the call returned.
    pub fn wait_until_timeout(
        &self,
        guard: &mut MutexGuard<'_, T>,
        mut pred: impl FnMut(&T) -> bool,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while !pred(guard) {
            if self.condvar.wait_until(guard, deadline).timed_out() {
                return pred(guard);
            }
        }
        true
    }

    /// Wake all waiters
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }

    /// Wake one waiter
    pub fn notify_one(&self) {
        self.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_monitor_lock_mutates() {
        let monitor = Monitor::new(0u32);
        *monitor.lock() = 7;
        assert_eq!(*monitor.lock(), 7);
    }

    #[test]
    fn test_monitor_wait_until_notified() {
        let monitor = Arc::new(Monitor::new(false));
        let signaler = Arc::clone(&monitor);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            *signaler.lock() = true;
            signaler.notify_all();
        });

        let mut guard = monitor.lock();
        monitor.wait_until(&mut guard, |done| *done);
        assert!(*guard);
        drop(guard);

        handle.join().unwrap();
    }

    #[test]
    fn test_monitor_wait_timeout_expires() {
        let monitor = Monitor::new(false);
        let mut guard = monitor.lock();
        let satisfied =
            monitor.wait_until_timeout(&mut guard, |done| *done, Duration::from_millis(20));
        assert!(!satisfied);
    }

    #[test]
    fn test_monitor_wait_immediate_predicate() {
        let monitor = Monitor::new(42u32);
        let mut guard = monitor.lock();
        // Predicate already true — must not block
        monitor.wait_until(&mut guard, |v| *v == 42);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_monitor_lock_released_on_panic() {
        let monitor = Arc::new(Monitor::new(0u32));
        let inner = Arc::clone(&monitor);

        let result = thread::spawn(move || {
            let _guard = inner.lock();
            panic!("boom");
        })
        .join();
        assert!(result.is_err());

        // Guard was dropped during unwind; the lock must be free again
        assert_eq!(*monitor.lock(), 0);
    }
}

//! Synchronization primitives shared by the runners

mod monitor;

pub use monitor::Monitor;

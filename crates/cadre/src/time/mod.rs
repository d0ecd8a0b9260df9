//! Virtual time for deterministic, timer-dependent tests

mod manual_clock;

pub use manual_clock::{Clock, ManualClock};

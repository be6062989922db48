// tickset: fixed-capacity polled software timers for bare-metal loops.
// time: tick arithmetic and the TimeSource abstraction
// slot: per-timer slot state (repeat policy, run accounting)
// set:  TimerSet pool, registration, and the two-phase poll pass

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod set;
pub mod slot;
pub mod time;

pub use set::{DEFAULT_CAPACITY, Job, RegisterError, TimerSet};
pub use slot::Repeat;
pub use time::{Tick, TimeSource, ticks_since};

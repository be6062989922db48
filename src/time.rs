// Monotonic tick arithmetic and the injected clock abstraction.
// Ticks wrap at the counter width; all elapsed math goes through
// wrapping subtraction so a wrap between two polls stays correct.

/// Monotonically increasing counter, typically milliseconds.
///
/// The counter is opaque to the scheduler: only differences matter.
/// It wraps at `u32::MAX` (about 49.7 days at 1 kHz) and every
/// comparison is taken modulo the counter width, so a wrap between
/// two polls does not disturb elapsed-time math as long as the true
/// gap stays under one full wrap period.
pub type Tick = u32;

/// Source of the current tick count.
///
/// Implementations must be monotonic (modulo wrap) and non-blocking.
/// The scheduler samples it once per poll pass, plus once per
/// registration or restart to take a fresh baseline.
pub trait TimeSource {
    /// The current tick count.
    fn now(&self) -> Tick;
}

/// Any zero-argument closure returning a tick works as a source, so a
/// host passes its `millis`-style function directly and tests pass a
/// closure over a `Cell`.
impl<F: Fn() -> Tick> TimeSource for F {
    fn now(&self) -> Tick {
        self()
    }
}

/// Ticks elapsed from `then` to `now`, correct across counter wrap.
#[inline]
pub fn ticks_since(now: Tick, then: Tick) -> Tick {
    now.wrapping_sub(then)
}

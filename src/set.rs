// Fixed-capacity timer pool driven by an explicit poll pass.
//
// The poll is two-phase: every due slot is decided first (decisions
// frozen into a stack buffer), then the decided jobs run. A job that
// mutates the set mid-pass cannot change what fires in the same pass;
// deletes requested from inside a fire are deferred to the end of it.

use core::fmt;

use crate::slot::{Repeat, Slot, Timer};
use crate::time::{Tick, TimeSource, ticks_since};

/// Slot count when the capacity parameter is left at its default.
pub const DEFAULT_CAPACITY: usize = 10;

/// A timer's action, invoked during a poll pass.
///
/// The job receives the index of the slot firing it and exclusive
/// access to the owning set, so it may delete, reconfigure, restart,
/// or register timers from inside the fire — including its own slot.
/// While a job runs it is moved out of its slot; mutations it makes
/// take effect per [`TimerSet::poll`]'s deferral rules.
///
/// Any plain `FnMut()` closure (or `fn()` pointer) is a `Job` through
/// the blanket impl and simply gets no set access. Sets holding
/// several different behaviors use one caller-defined type, typically
/// an enum:
///
/// ```
/// use core::cell::Cell;
/// use tickset::{Job, TimeSource, TimerSet};
///
/// struct Beep<'a>(&'a Cell<u32>);
///
/// impl<'a, T: TimeSource, const N: usize> Job<T, N> for Beep<'a> {
///     fn fire(&mut self, slot: usize, timers: &mut TimerSet<Self, T, N>) {
///         self.0.set(self.0.get() + 1);
///         if self.0.get() == 3 {
///             timers.delete(slot);
///         }
///     }
/// }
///
/// let now = Cell::new(0u32);
/// let beeps = Cell::new(0u32);
/// let mut timers: TimerSet<Beep<'_>, _, 2> = TimerSet::new(|| now.get());
/// timers.register_forever(100, Beep(&beeps)).unwrap();
///
/// for t in 1..=5u32 {
///     now.set(t * 100);
///     timers.poll();
/// }
/// assert_eq!(beeps.get(), 3);
/// assert_eq!(timers.active_count(), 0);
/// ```
pub trait Job<T, const N: usize>: Sized {
    /// Run the timer's action. `slot` is the index of the slot firing it.
    fn fire(&mut self, slot: usize, timers: &mut TimerSet<Self, T, N>);
}

impl<T, const N: usize, F: FnMut()> Job<T, N> for F {
    fn fire(&mut self, _slot: usize, _timers: &mut TimerSet<Self, T, N>) {
        self()
    }
}

/// Registration failed. Hands the rejected job back to the caller.
#[derive(Clone, Copy)]
pub enum RegisterError<C> {
    /// Every slot is occupied.
    CapacityExceeded(C),
}

// Hand-written so the job type needs no Debug bound.
impl<C> fmt::Debug for RegisterError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::CapacityExceeded(_) => f.write_str("CapacityExceeded"),
        }
    }
}

impl<C> fmt::Display for RegisterError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::CapacityExceeded(_) => write!(f, "no free timer slot"),
        }
    }
}

/// Decision frozen for one slot during phase 1 of a poll pass.
#[derive(Clone, Copy, PartialEq)]
enum Action {
    Skip,
    Fire,
    /// Fire, then reclaim: this fire consumes the last of the run budget.
    FireAndDelete,
    /// Reclaim without firing: the run budget was already zero.
    Expire,
}

/// Fixed-capacity pool of polled software timers.
///
/// `C` is the job type, `T` the [`TimeSource`], `N` the slot count
/// (fixed at compile time, default [`DEFAULT_CAPACITY`]). Memory use
/// is fully static: the slot array plus one stack-local decision
/// buffer per poll pass.
///
/// ```
/// use core::cell::Cell;
/// use tickset::TimerSet;
///
/// let now = Cell::new(0u32);
/// let blinks = Cell::new(0u32);
/// let mut timers: TimerSet<_, _, 4> = TimerSet::new(|| now.get());
/// timers.register_forever(1000, || blinks.set(blinks.get() + 1)).unwrap();
///
/// now.set(1000);
/// timers.poll();
/// assert_eq!(blinks.get(), 1);
/// ```
pub struct TimerSet<C, T, const N: usize = DEFAULT_CAPACITY> {
    clock: T,
    slots: [Slot<C>; N],
    /// Number of occupied slots.
    active: usize,
    /// Set for the duration of a poll pass; gates re-entry and defers
    /// deletes so phase-1 decisions stay frozen.
    polling: bool,
}

impl<C, T: TimeSource, const N: usize> TimerSet<C, T, N> {
    /// A set with every slot free, reading time from `clock`.
    pub const fn new(clock: T) -> Self {
        Self {
            clock,
            slots: [const { Slot::Free }; N],
            active: 0,
            polling: false,
        }
    }

    /// Arm a timer in the lowest-indexed free slot.
    ///
    /// The returned index addresses the timer in every control call.
    /// It is stable until the slot is deleted (explicitly or after a
    /// bounded timer's final fire), after which a later registration
    /// may reuse it.
    pub fn register(
        &mut self,
        period: Tick,
        job: C,
        repeat: Repeat,
    ) -> Result<usize, RegisterError<C>> {
        // The scan is the authoritative capacity check; `active` only
        // mirrors it.
        let Some(index) = self.slots.iter().position(|s| matches!(s, Slot::Free)) else {
            log::warn!("timer: no free slot (capacity {})", N);
            return Err(RegisterError::CapacityExceeded(job));
        };
        let now = self.clock.now();
        self.slots[index] = Slot::Occupied(Timer {
            job: Some(job),
            period,
            last_fire: now,
            repeat,
            runs: 0,
            enabled: true,
            doomed: false,
        });
        self.active += 1;
        log::debug!("timer: slot {} armed, period {} ({})", index, period, repeat);
        Ok(index)
    }

    /// Arm a timer that fires every `period` ticks until deleted.
    pub fn register_forever(&mut self, period: Tick, job: C) -> Result<usize, RegisterError<C>> {
        self.register(period, job, Repeat::Forever)
    }

    /// Arm a timer that fires once after `period` ticks, then frees
    /// its slot.
    pub fn register_once(&mut self, period: Tick, job: C) -> Result<usize, RegisterError<C>> {
        self.register(period, job, Repeat::Times(1))
    }

    /// Run one poll pass; returns the number of jobs fired.
    ///
    /// Call this from the host loop, frequently and unboundedly. A
    /// late call delays fires but never double-counts them: at most
    /// one fire per slot per pass, with the baseline stepped one
    /// period at a time so a backlog drains over successive passes
    /// instead of bursting.
    ///
    /// Calling `poll` from inside a job (on the set firing it) is a
    /// no-op.
    pub fn poll(&mut self) -> usize
    where
        C: Job<T, N>,
    {
        if self.polling {
            return 0;
        }
        self.polling = true;
        let now = self.clock.now();

        // Phase 1: freeze a decision for every slot before any job
        // runs. The buffer dies with this pass.
        let mut actions = [Action::Skip; N];
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Slot::Occupied(timer) = slot else { continue };
            if ticks_since(now, timer.last_fire) < timer.period {
                continue;
            }
            // Step the baseline by one period, not to `now`: poll
            // jitter must not push later fires out (no drift), and a
            // missed stretch leaves the slot due again next pass.
            timer.last_fire = timer.last_fire.wrapping_add(timer.period);
            if !timer.enabled {
                continue;
            }
            actions[index] = match timer.repeat {
                Repeat::Forever => Action::Fire,
                Repeat::Times(limit) if timer.runs < limit => {
                    timer.runs += 1;
                    if timer.runs >= limit {
                        Action::FireAndDelete
                    } else {
                        Action::Fire
                    }
                }
                Repeat::Times(_) => Action::Expire,
            };
        }

        // Phase 2: run the frozen decisions. Each job is moved out of
        // its slot for the duration of its fire, so it gets the whole
        // set and may mutate any slot; deletes it requests are
        // deferred below, so a decision frozen above still fires even
        // if an earlier job deleted that slot this pass.
        let mut fired = 0;
        for index in 0..N {
            match actions[index] {
                Action::Skip => continue,
                Action::Expire => {
                    log::debug!("timer: slot {} expired with no runs left", index);
                    self.reclaim(index);
                    continue;
                }
                Action::Fire | Action::FireAndDelete => {}
            }
            let Some(mut job) = self.take_job(index) else {
                continue;
            };
            log::trace!("timer: slot {} fired", index);
            job.fire(index, self);
            fired += 1;
            self.return_job(index, job, actions[index] == Action::FireAndDelete);
        }

        // Deferred deletes against slots that had not (or never) fired
        // this pass.
        for index in 0..N {
            if matches!(&self.slots[index], Slot::Occupied(t) if t.doomed) {
                self.reclaim(index);
            }
        }

        self.polling = false;
        fired
    }

    /// Free a slot. Returns false when the index is out of range or
    /// the slot holds no timer.
    ///
    /// During a poll pass the slot is only marked for removal and
    /// reclaimed once the pass ends; decisions already frozen for it
    /// still execute, and until then it still counts as active.
    pub fn delete(&mut self, index: usize) -> bool {
        if index >= N {
            return false;
        }
        if self.polling {
            let Slot::Occupied(timer) = &mut self.slots[index] else {
                return false;
            };
            if timer.doomed {
                return false;
            }
            timer.doomed = true;
            log::debug!("timer: slot {} delete deferred to end of pass", index);
            return true;
        }
        if matches!(self.slots[index], Slot::Free) {
            return false;
        }
        self.reclaim(index);
        true
    }

    /// Reset a timer's fire baseline to the current tick. Enabled
    /// state, run count, and period are untouched; a freed slot stays
    /// free. Returns whether a timer was restarted.
    pub fn restart(&mut self, index: usize) -> bool {
        let now = self.clock.now();
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(timer)) => {
                timer.last_fire = now;
                true
            }
            _ => false,
        }
    }

    /// Whether the slot holds a timer that is enabled. False for
    /// out-of-range, free, or disabled slots.
    pub fn is_enabled(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Occupied(t)) if t.enabled)
    }

    /// Let the timer's fires through again. Returns whether a timer
    /// was addressed; no catch-up fire results unless a full period
    /// has already elapsed since the baseline last advanced.
    pub fn enable(&mut self, index: usize) -> bool {
        self.set_enabled(index, true)
    }

    /// Suppress the timer's fires. Its baseline still advances each
    /// period while disabled. Returns whether a timer was addressed.
    pub fn disable(&mut self, index: usize) -> bool {
        self.set_enabled(index, false)
    }

    /// Flip the timer between enabled and disabled. Returns whether a
    /// timer was addressed; free slots have no flag to flip.
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(timer)) => {
                timer.enabled = !timer.enabled;
                true
            }
            _ => false,
        }
    }

    /// Whether the slot holds a timer.
    pub fn is_active(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Occupied(_)))
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of free slots.
    pub fn available_count(&self) -> usize {
        N - self.active
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn is_full(&self) -> bool {
        self.active == N
    }

    fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(timer)) => {
                timer.enabled = enabled;
                true
            }
            _ => false,
        }
    }

    fn take_job(&mut self, index: usize) -> Option<C> {
        match &mut self.slots[index] {
            Slot::Occupied(timer) => timer.job.take(),
            Slot::Free => None,
        }
    }

    /// Put a job back after its fire, or reclaim the slot if the
    /// timer finished its run budget or was deleted from inside the
    /// fire.
    fn return_job(&mut self, index: usize, job: C, finished: bool) {
        let reclaim = match &mut self.slots[index] {
            Slot::Occupied(timer) => {
                if finished || timer.doomed {
                    true
                } else {
                    timer.job = Some(job);
                    false
                }
            }
            Slot::Free => false,
        };
        if reclaim {
            self.reclaim(index);
        }
    }

    /// Caller guarantees the slot is occupied.
    fn reclaim(&mut self, index: usize) {
        self.slots[index] = Slot::Free;
        self.active -= 1;
        log::debug!("timer: slot {} freed", index);
    }
}

//! One-shot timer contract, timer handles and state.

use core::fmt;
use core::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::RtosResult;

static NEXT_TIMER_ID: AtomicU32 = AtomicU32::new(1);

/// Typed handle identifying a timer created by an [`Rtos`](crate::Rtos).
///
/// Handles are unique for the life of the process, so a callback can always tell
/// which timer produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(NonZeroU32);

impl TimerId {
    /// Allocate a fresh, process-unique timer handle.
    #[must_use]
    pub fn next() -> Self {
        let raw = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
    }

    /// Get the raw handle value.
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Expiry event delivered to a timer callback.
///
/// `generation` names the arm that produced the event; every call to
/// [`OneShotTimer::arm`] returns a new one. A receiver compares it with the
/// generation it last armed to recognise a fire that was superseded in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerFire {
    /// Timer that expired.
    pub timer: TimerId,
    /// Arm generation that expired.
    pub generation: u64,
}

/// Callback invoked from the timer-service context on expiry.
///
/// It must not block.
pub type TimerCallback = Arc<dyn Fn(TimerFire) + Send + Sync>;

/// Lifecycle of a one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TimerState {
    /// Created or stopped; no expiry pending.
    #[default]
    Idle = 0,
    /// Counting down towards expiry.
    Armed = 1,
    /// Expired and executed its callback.
    Fired = 2,
}

impl TimerState {
    /// Convert from raw u8 value.
    #[must_use]
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Armed),
            2 => Some(Self::Fired),
            _ => None,
        }
    }

    /// Get the state as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Armed => "Armed",
            Self::Fired => "Fired",
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

fn pack(generation: u64, state: TimerState) -> u64 {
    (generation << STATE_BITS) | u64::from(state as u8)
}

fn unpack(word: u64) -> (u64, TimerState) {
    let state = u8::try_from(word & STATE_MASK)
        .ok()
        .and_then(TimerState::from_raw)
        .unwrap_or_default();
    (word >> STATE_BITS, state)
}

/// Lock-free timer state and arm generation, updated as one word.
///
/// Keeping both in a single atomic means an expiry can only move the exact arm it
/// was scheduled for from `Armed` to `Fired`; a rearm that lands in between makes
/// the stale expiry fail instead of consuming the new arm.
#[derive(Debug, Default)]
pub struct AtomicTimerState {
    word: AtomicU64,
}

impl AtomicTimerState {
    /// Create a state cell in [`TimerState::Idle`] at generation 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Read the current state.
    #[must_use]
    pub fn load(&self) -> TimerState {
        unpack(self.word.load(Ordering::Acquire)).1
    }

    /// Read the generation of the latest arm or stop.
    #[must_use]
    pub fn generation(&self) -> u64 {
        unpack(self.word.load(Ordering::Acquire)).0
    }

    /// Start a new arm, returning its generation.
    pub fn arm(&self) -> u64 {
        self.bump(TimerState::Armed)
    }

    /// Cancel any pending arm and return to `Idle`.
    pub fn stop(&self) {
        self.bump(TimerState::Idle);
    }

    /// Move arm `generation` from `Armed` to `Fired`.
    ///
    /// Returns `false` if that arm was stopped or superseded.
    pub fn try_fire(&self, generation: u64) -> bool {
        self.word
            .compare_exchange(
                pack(generation, TimerState::Armed),
                pack(generation, TimerState::Fired),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Whether arm `generation` is still counting down.
    #[must_use]
    pub fn is_pending(&self, generation: u64) -> bool {
        self.word.load(Ordering::Acquire) == pack(generation, TimerState::Armed)
    }

    fn bump(&self, state: TimerState) -> u64 {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let next_generation = unpack(current).0.wrapping_add(1) & (u64::MAX >> STATE_BITS);
            match self.word.compare_exchange_weak(
                current,
                pack(next_generation, state),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_generation,
                Err(actual) => current = actual,
            }
        }
    }
}

/// A reusable one-shot relative timer.
///
/// # Contract
///
/// - `arm` starts a countdown of `ticks` timer-service ticks, replacing any pending
///   countdown, and returns the generation the eventual [`TimerFire`] will carry.
/// - `stop` cancels a pending countdown and returns the timer to `Idle`; stopping an
///   idle timer has no observable effect.
/// - Neither method waits for a callback that is already executing.
pub trait OneShotTimer: Send + Sync {
    /// Handle passed back to the callback.
    fn id(&self) -> TimerId;

    /// Current lifecycle state.
    fn state(&self) -> TimerState;

    /// Arm (or rearm) the timer for `ticks` ticks.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to start the countdown.
    fn arm(&self, ticks: u64) -> RtosResult<u64>;

    /// Stop a pending countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to stop the countdown.
    fn stop(&self) -> RtosResult<()>;

    /// Check if a countdown is pending.
    fn is_armed(&self) -> bool {
        self.state() == TimerState::Armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_ids_are_unique() {
        let a = TimerId::next();
        let b = TimerId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_state_round_trip_and_display() {
        for state in [TimerState::Idle, TimerState::Armed, TimerState::Fired] {
            assert_eq!(TimerState::from_raw(state as u8), Some(state));
        }
        assert_eq!(TimerState::from_raw(9), None);
        assert_eq!(TimerState::Armed.to_string(), "Armed");
    }

    #[test]
    fn test_try_fire_only_current_arm() {
        let state = AtomicTimerState::new();
        assert!(!state.try_fire(0));

        let first = state.arm();
        let second = state.arm();
        assert_ne!(first, second);
        assert!(!state.try_fire(first));
        assert_eq!(state.load(), TimerState::Armed);

        assert!(state.try_fire(second));
        assert_eq!(state.load(), TimerState::Fired);
        assert!(!state.try_fire(second));
    }

    #[test]
    fn test_stop_invalidates_pending_arm() {
        let state = AtomicTimerState::new();
        let generation = state.arm();
        state.stop();
        assert_eq!(state.load(), TimerState::Idle);
        assert!(!state.try_fire(generation));
        assert!(state.generation() > generation);
    }

    #[test]
    fn test_only_latest_arm_is_pending() {
        let state = AtomicTimerState::new();
        let first = state.arm();
        assert!(state.is_pending(first));

        let second = state.arm();
        assert!(!state.is_pending(first));
        assert!(state.is_pending(second));

        state.stop();
        assert!(!state.is_pending(second));

        let third = state.arm();
        assert!(state.try_fire(third));
        assert!(!state.is_pending(third));
    }

    #[test]
    fn test_trait_bounds() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn OneShotTimer>();
    }
}

//! The bridge's one-shot wake timer.

use vmwake_rtos::{OneShotTimer, RtosResult, TickRate, TimerId, TimerState};

/// A one-shot timer armed in milliseconds and counted in platform ticks.
#[derive(Debug)]
pub struct WakeTimer<T> {
    timer: T,
    tick_rate: TickRate,
}

impl<T: OneShotTimer> WakeTimer<T> {
    /// Wrap a timer created on a platform ticking at `tick_rate`.
    pub fn new(timer: T, tick_rate: TickRate) -> Self {
        Self { timer, tick_rate }
    }

    /// Identity of the underlying timer.
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.timer.id()
    }

    /// Current timer state.
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.timer.state()
    }

    /// Ticks used to cover `relative_ms`, never fewer than one.
    #[must_use]
    pub fn ticks_for(&self, relative_ms: i64) -> u64 {
        self.tick_rate.ms_to_ticks_ceil(relative_ms).max(1)
    }

    /// Start a countdown of at least `relative_ms`, replacing any pending one.
    ///
    /// Returns the generation of the new arm.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the timer could not be started.
    pub fn arm_after_ms(&self, relative_ms: i64) -> RtosResult<u64> {
        self.timer.arm(self.ticks_for(relative_ms))
    }

    /// Stop the timer if it is armed. Returns whether a stop was issued.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the stop was rejected.
    pub fn stop_if_armed(&self) -> RtosResult<bool> {
        if !self.timer.is_armed() {
            return Ok(false);
        }
        self.timer.stop()?;
        Ok(true)
    }

    /// The wrapped platform timer.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.timer
    }
}

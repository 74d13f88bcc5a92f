//! Monotonic time and the VM's application-time offset.
//!
//! All deadline arithmetic uses the raw monotonic reading in milliseconds. The
//! application offset only shifts what [`ClockSource::current_time`] reports when
//! the VM asks for application time.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// A monotonically non-decreasing time source.
pub trait MonotonicClock: Send + Sync {
    /// Nanoseconds since an arbitrary fixed origin.
    fn now_ns(&self) -> i64;

    /// Milliseconds since the same origin.
    fn now_ms(&self) -> i64 {
        self.now_ns().div_euclid(NANOS_PER_MILLI)
    }
}

/// Host monotonic clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_ns(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ns: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    #[must_use]
    pub fn starting_at_ms(start_ms: i64) -> Self {
        Self {
            ns: Arc::new(AtomicI64::new(start_ms.saturating_mul(NANOS_PER_MILLI))),
        }
    }

    /// Jump to `ms`.
    pub fn set_ms(&self, ms: i64) {
        self.ns
            .store(ms.saturating_mul(NANOS_PER_MILLI), Ordering::SeqCst);
    }

    /// Move forward by `ms`.
    pub fn advance_ms(&self, ms: i64) {
        self.advance_ns(ms.saturating_mul(NANOS_PER_MILLI));
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.advance_ns(i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX));
    }

    fn advance_ns(&self, delta: i64) {
        let mut current = self.ns.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(delta);
            match self
                .ns
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl MonotonicClock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.ns.load(Ordering::SeqCst)
    }
}

/// A monotonic clock plus the VM-supplied application-time offset.
pub struct ClockSource<C> {
    clock: C,
    application_offset_ms: AtomicI64,
}

impl<C: MonotonicClock> ClockSource<C> {
    /// Wrap a monotonic clock with a zero offset.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            application_offset_ms: AtomicI64::new(0),
        }
    }

    /// The underlying clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Raw monotonic milliseconds, used for all deadline arithmetic.
    #[inline]
    #[must_use]
    pub fn monotonic_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Record the offset added to application time.
    pub fn set_application_time(&self, offset_ms: i64) {
        self.application_offset_ms
            .store(offset_ms, Ordering::Release);
    }

    /// Offset last recorded by [`set_application_time`](Self::set_application_time).
    #[must_use]
    pub fn application_offset_ms(&self) -> i64 {
        self.application_offset_ms.load(Ordering::Acquire)
    }

    /// Current time in milliseconds: application time if `use_app_offset`, else
    /// raw monotonic time.
    #[must_use]
    pub fn current_time(&self, use_app_offset: bool) -> i64 {
        let now = self.monotonic_ms();
        if use_app_offset {
            now.saturating_add(self.application_offset_ms())
        } else {
            now
        }
    }

    /// Raw monotonic nanoseconds.
    #[must_use]
    pub fn time_nanos(&self) -> i64 {
        self.clock.now_ns()
    }
}

impl<C: fmt::Debug> fmt::Debug for ClockSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSource")
            .field("clock", &self.clock)
            .field(
                "application_offset_ms",
                &self.application_offset_ms.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_applies_only_to_application_time() {
        let clock = ManualClock::starting_at_ms(1_000);
        let source = ClockSource::new(clock.clone());

        source.set_application_time(500);
        assert_eq!(source.current_time(true), 1_500);
        assert_eq!(source.current_time(false), 1_000);
        assert_eq!(source.monotonic_ms(), 1_000);

        clock.advance_ms(20);
        assert_eq!(source.current_time(true), 1_520);
    }

    #[test]
    fn test_negative_offset() {
        let source = ClockSource::new(ManualClock::starting_at_ms(100));
        source.set_application_time(-300);
        assert_eq!(source.current_time(true), -200);
    }

    #[test]
    fn test_nanos_and_millis_agree() {
        let clock = ManualClock::default();
        clock.advance(Duration::from_micros(2_500));
        let source = ClockSource::new(clock);
        assert_eq!(source.time_nanos(), 2_500_000);
        assert_eq!(source.monotonic_ms(), 2);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let source = ClockSource::new(SystemClock::new());
        let first = source.time_nanos();
        let second = source.time_nanos();
        assert!(second >= first);
        assert!(first >= 0);
    }
}

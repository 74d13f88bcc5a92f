//! Timer-service tick rate and millisecond conversion.

use core::fmt;
use std::time::Duration;

const MS_PER_SECOND: u128 = 1_000;
const NS_PER_SECOND: u128 = 1_000_000_000;

/// Tick rate of the RTOS timer service, in Hz.
///
/// A rate of zero means the timer service is disabled or not configured.
///
/// # Example
///
/// ```rust
/// use vmwake_rtos::TickRate;
///
/// let rate = TickRate::from_hz(100);
/// // 10ms per tick: 25ms needs 3 ticks, never 2
/// assert_eq!(rate.ms_to_ticks_ceil(25), 3);
/// assert_eq!(rate.ms_to_ticks_ceil(0), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Create a tick rate from a frequency in Hz.
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        Self { hz }
    }

    /// Get the frequency in Hz.
    #[inline]
    #[must_use]
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Check if the timer service can count ticks at this rate.
    #[inline]
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.hz > 0
    }

    /// Convert a relative delay in milliseconds to ticks, rounding up.
    ///
    /// Rounding up guarantees the timer never expires before the requested delay.
    /// Non-positive delays and a disabled rate yield `0`. Saturates at `u64::MAX`.
    #[must_use]
    pub fn ms_to_ticks_ceil(self, ms: i64) -> u64 {
        if ms <= 0 || !self.is_enabled() {
            return 0;
        }
        let scaled = u128::from(ms.unsigned_abs()).saturating_mul(u128::from(self.hz));
        u64::try_from(scaled.div_ceil(MS_PER_SECOND)).unwrap_or(u64::MAX)
    }

    /// Convert ticks back to wall-clock duration.
    ///
    /// A disabled rate yields [`Duration::ZERO`].
    #[must_use]
    pub fn ticks_to_duration(self, ticks: u64) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        let nanos = u128::from(ticks)
            .saturating_mul(NS_PER_SECOND)
            .div_ceil(u128::from(self.hz));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz)
    }
}

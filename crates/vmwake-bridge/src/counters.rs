//! Bridge activity counters.
//!
//! Every counter is a relaxed `AtomicU64`; increments are safe from the timer-service
//! context and never block. Read them through [`BridgeCounters::snapshot`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`BridgeCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Schedule requests whose deadline had already elapsed.
    pub immediate_notifications: u64,
    /// Notifications delivered from a current timer expiry.
    pub timer_notifications: u64,
    /// Expiries that belonged to a superseded arm.
    pub stale_fires: u64,
    /// Expiries from a timer other than the wake timer.
    pub foreign_fires: u64,
    /// Successful timer arms.
    pub arms: u64,
    /// Stops issued against an armed timer.
    pub stops: u64,
    /// Schedule requests that kept the pending arm.
    pub keeps: u64,
    /// Times the VM task went idle.
    pub idles: u64,
    /// Wake signal releases.
    pub wakeups: u64,
    /// Primitive operations that failed.
    pub failures: u64,
}

impl CounterSnapshot {
    /// Total scheduler notifications, from either path.
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.immediate_notifications
            .saturating_add(self.timer_notifications)
    }
}

/// Lock-free bridge counters.
#[derive(Debug, Default)]
pub struct BridgeCounters {
    immediate_notifications: AtomicU64,
    timer_notifications: AtomicU64,
    stale_fires: AtomicU64,
    foreign_fires: AtomicU64,
    arms: AtomicU64,
    stops: AtomicU64,
    keeps: AtomicU64,
    idles: AtomicU64,
    wakeups: AtomicU64,
    failures: AtomicU64,
}

impl BridgeCounters {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            immediate_notifications: AtomicU64::new(0),
            timer_notifications: AtomicU64::new(0),
            stale_fires: AtomicU64::new(0),
            foreign_fires: AtomicU64::new(0),
            arms: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            keeps: AtomicU64::new(0),
            idles: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_immediate_notification(&self) {
        self.immediate_notifications.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_timer_notification(&self) {
        self.timer_notifications.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_stale_fire(&self) {
        self.stale_fires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_foreign_fire(&self) {
        self.foreign_fires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_arm(&self) {
        self.arms.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_keep(&self) {
        self.keeps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_idle(&self) {
        self.idles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            immediate_notifications: self.immediate_notifications.load(Ordering::Relaxed),
            timer_notifications: self.timer_notifications.load(Ordering::Relaxed),
            stale_fires: self.stale_fires.load(Ordering::Relaxed),
            foreign_fires: self.foreign_fires.load(Ordering::Relaxed),
            arms: self.arms.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            keeps: self.keeps.load(Ordering::Relaxed),
            idles: self.idles.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

//! Deadline bookkeeping for the single wake timer.
//!
//! [`DeadlineTracker`] is pure state: it decides what a schedule request should do
//! and interprets timer expiries, but never touches a primitive. The bridge holds
//! it under one lock together with the timer calls it prescribes.

/// Sentinel meaning no wake is pending.
pub const NO_PENDING_WAKE: i64 = i64::MAX;

/// What a schedule request must do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The deadline is due now or already past. Stop any pending timer and
    /// notify the scheduler synchronously.
    NotifyNow,
    /// Stop any pending timer and arm it for `relative_ms` from now.
    Rearm {
        /// Positive delay until the deadline.
        relative_ms: i64,
    },
    /// An earlier wake is still pending; leave the timer alone.
    Keep,
}

/// How an expiry relates to the current arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The expiry belongs to the arm the tracker is waiting on.
    Current,
    /// The expiry belongs to an arm that was since stopped or replaced.
    Stale,
}

/// Earliest pending wake deadline and the arm that will deliver it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineTracker {
    next_wake: i64,
    timer_fired: bool,
    armed_generation: Option<u64>,
}

impl Default for DeadlineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineTracker {
    /// Tracker with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_wake: NO_PENDING_WAKE,
            timer_fired: false,
            armed_generation: None,
        }
    }

    /// Absolute deadline the armed timer will deliver, if any.
    #[must_use]
    pub fn next_wake_deadline(&self) -> Option<i64> {
        (self.next_wake != NO_PENDING_WAKE).then_some(self.next_wake)
    }

    /// Whether the last arm expired and no newer arm has been made.
    #[must_use]
    pub fn timer_fired(&self) -> bool {
        self.timer_fired
    }

    /// Generation of the arm the tracker is waiting on.
    #[must_use]
    pub fn armed_generation(&self) -> Option<u64> {
        self.armed_generation
    }

    /// Decide how to honour a request to wake at `deadline_ms`, given `now_ms`.
    ///
    /// A deadline equal to the pending one keeps the pending arm.
    pub fn decide(&mut self, deadline_ms: i64, now_ms: i64) -> Decision {
        let relative_ms = deadline_ms.saturating_sub(now_ms);
        if relative_ms <= 0 {
            self.clear();
            return Decision::NotifyNow;
        }

        if self.timer_fired || deadline_ms < self.next_wake || self.next_wake <= now_ms {
            self.next_wake = deadline_ms;
            self.timer_fired = false;
            self.armed_generation = None;
            return Decision::Rearm { relative_ms };
        }

        Decision::Keep
    }

    /// Record the generation returned by a successful arm.
    pub fn record_arm(&mut self, generation: u64) {
        self.armed_generation = Some(generation);
    }

    /// Forget the pending deadline after a failed stop or arm.
    pub fn abandon_arm(&mut self) {
        self.clear();
    }

    /// Interpret an expiry of the wake timer.
    ///
    /// Only the arm being waited on can mark the tracker fired; anything else is
    /// reported as stale and changes nothing.
    pub fn on_fire(&mut self, generation: u64) -> FireOutcome {
        if self.armed_generation != Some(generation) {
            return FireOutcome::Stale;
        }
        self.timer_fired = true;
        self.next_wake = NO_PENDING_WAKE;
        self.armed_generation = None;
        FireOutcome::Current
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn clear(&mut self) {
        self.next_wake = NO_PENDING_WAKE;
        self.armed_generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_arms() {
        let mut tracker = DeadlineTracker::new();
        assert_eq!(
            tracker.decide(1_050, 1_000),
            Decision::Rearm { relative_ms: 50 }
        );
        assert_eq!(tracker.next_wake_deadline(), Some(1_050));
    }

    #[test]
    fn test_later_request_keeps_earlier_arm() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_050, 1_000);
        tracker.record_arm(1);
        assert_eq!(tracker.decide(1_200, 1_010), Decision::Keep);
        assert_eq!(tracker.next_wake_deadline(), Some(1_050));
        assert_eq!(tracker.armed_generation(), Some(1));
    }

    #[test]
    fn test_equal_request_keeps() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_050, 1_000);
        tracker.record_arm(1);
        assert_eq!(tracker.decide(1_050, 1_000), Decision::Keep);
    }

    #[test]
    fn test_earlier_request_rearms() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_200, 1_000);
        tracker.record_arm(1);
        assert_eq!(
            tracker.decide(1_050, 1_010),
            Decision::Rearm { relative_ms: 40 }
        );
        assert_eq!(tracker.armed_generation(), None);
    }

    #[test]
    fn test_past_deadline_notifies_and_clears() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_200, 1_000);
        tracker.record_arm(1);
        assert_eq!(tracker.decide(990, 1_000), Decision::NotifyNow);
        assert_eq!(tracker.decide(1_000, 1_000), Decision::NotifyNow);
        assert_eq!(tracker.next_wake_deadline(), None);
        assert_eq!(tracker.on_fire(1), FireOutcome::Stale);
    }

    #[test]
    fn test_fire_then_any_future_request_rearms() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_050, 1_000);
        tracker.record_arm(3);
        assert_eq!(tracker.on_fire(3), FireOutcome::Current);
        assert!(tracker.timer_fired());
        assert_eq!(tracker.next_wake_deadline(), None);

        assert!(matches!(
            tracker.decide(2_000, 1_050),
            Decision::Rearm { relative_ms: 950 }
        ));
        assert!(!tracker.timer_fired());
    }

    #[test]
    fn test_stale_fire_changes_nothing() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_050, 1_000);
        tracker.record_arm(5);
        let before = tracker.clone();
        assert_eq!(tracker.on_fire(4), FireOutcome::Stale);
        assert_eq!(tracker, before);
    }

    #[test]
    fn test_elapsed_pending_deadline_is_replaced() {
        let mut tracker = DeadlineTracker::new();
        tracker.decide(1_050, 1_000);
        tracker.record_arm(1);
        // The pending deadline has passed without an expiry being observed yet
        assert!(matches!(
            tracker.decide(1_300, 1_060),
            Decision::Rearm { relative_ms: 240 }
        ));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let mut tracker = DeadlineTracker::new();
        assert_eq!(tracker.decide(i64::MIN, i64::MAX), Decision::NotifyNow);
        assert!(matches!(
            tracker.decide(i64::MAX - 1, i64::MIN),
            Decision::Rearm { relative_ms: i64::MAX }
        ));
    }
}

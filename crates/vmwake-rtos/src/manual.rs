//! Deterministic RTOS implementation for tests and simulations.
//!
//! `ManualRtos` timers never expire on their own: the caller decides when the
//! timer-service context runs by calling [`ManualTimer::fire`], and may replay a
//! superseded expiry with [`ManualTimer::fire_stale`] to reproduce the stop/rearm race.
//! A shared [`FaultPlan`] makes any primitive operation fail on demand.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{RtosError, RtosResult};
use crate::rtos::Rtos;
use crate::semaphore::{CountingSemaphore, SoftwareSemaphore};
use crate::tick::TickRate;
use crate::timer::{AtomicTimerState, OneShotTimer, TimerCallback, TimerFire, TimerId, TimerState};

/// Switches that make primitive operations fail.
#[derive(Debug, Default)]
pub struct FaultPlan {
    fail_timer_create: AtomicBool,
    fail_semaphore_create: AtomicBool,
    fail_arm: AtomicBool,
    fail_stop: AtomicBool,
    fail_pend: AtomicBool,
    fail_post: AtomicBool,
}

impl FaultPlan {
    /// Make timer creation fail.
    pub fn fail_timer_create(&self, enabled: bool) {
        self.fail_timer_create.store(enabled, Ordering::SeqCst);
    }

    /// Make semaphore creation fail.
    pub fn fail_semaphore_create(&self, enabled: bool) {
        self.fail_semaphore_create.store(enabled, Ordering::SeqCst);
    }

    /// Make `arm` fail.
    pub fn fail_arm(&self, enabled: bool) {
        self.fail_arm.store(enabled, Ordering::SeqCst);
    }

    /// Make `stop` fail.
    pub fn fail_stop(&self, enabled: bool) {
        self.fail_stop.store(enabled, Ordering::SeqCst);
    }

    /// Make `pend` fail.
    pub fn fail_pend(&self, enabled: bool) {
        self.fail_pend.store(enabled, Ordering::SeqCst);
    }

    /// Make `post_all` fail.
    pub fn fail_post(&self, enabled: bool) {
        self.fail_post.store(enabled, Ordering::SeqCst);
    }

    /// Clear every fault.
    pub fn clear(&self) {
        for flag in [
            &self.fail_timer_create,
            &self.fail_semaphore_create,
            &self.fail_arm,
            &self.fail_stop,
            &self.fail_pend,
            &self.fail_post,
        ] {
            flag.store(false, Ordering::SeqCst);
        }
    }

    fn is_set(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

struct ManualTimerInner {
    id: TimerId,
    name: &'static str,
    initial_ticks: u64,
    state: AtomicTimerState,
    callback: TimerCallback,
    arms: Mutex<Vec<u64>>,
    stops: AtomicU64,
}

/// Timer whose expiry is driven by the test.
#[derive(Clone)]
pub struct ManualTimer {
    inner: Arc<ManualTimerInner>,
    faults: Arc<FaultPlan>,
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimer")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.load())
            .field("arms", &self.inner.arms.lock().len())
            .finish_non_exhaustive()
    }
}

impl ManualTimer {
    /// Name given at creation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Countdown supplied at creation.
    #[must_use]
    pub fn initial_ticks(&self) -> u64 {
        self.inner.initial_ticks
    }

    /// Tick counts of every successful arm, oldest first.
    #[must_use]
    pub fn arm_history(&self) -> Vec<u64> {
        self.inner.arms.lock().clone()
    }

    /// Number of successful arms.
    #[must_use]
    pub fn arm_count(&self) -> usize {
        self.inner.arms.lock().len()
    }

    /// Tick count of the latest arm.
    #[must_use]
    pub fn last_armed_ticks(&self) -> Option<u64> {
        self.inner.arms.lock().last().copied()
    }

    /// Number of successful stops.
    #[must_use]
    pub fn stop_count(&self) -> u64 {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// Generation of the latest arm or stop.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.state.generation()
    }

    /// Expire the pending countdown, running the callback on the calling thread.
    ///
    /// Returns `None` (and runs nothing) if the timer is not armed.
    pub fn fire(&self) -> Option<TimerFire> {
        let generation = self.inner.state.generation();
        if !self.inner.state.try_fire(generation) {
            return None;
        }
        let fire = TimerFire {
            timer: self.inner.id,
            generation,
        };
        (self.inner.callback)(fire);
        Some(fire)
    }

    /// Deliver an expiry for an older arm, as if the timer service had dispatched it
    /// just before a stop or rearm took effect. Timer state is left untouched.
    pub fn fire_stale(&self, generation: u64) -> TimerFire {
        let fire = TimerFire {
            timer: self.inner.id,
            generation,
        };
        (self.inner.callback)(fire);
        fire
    }

    /// Run this timer's callback with an arbitrary event.
    pub fn deliver(&self, fire: TimerFire) {
        (self.inner.callback)(fire);
    }
}

impl OneShotTimer for ManualTimer {
    fn id(&self) -> TimerId {
        self.inner.id
    }

    fn state(&self) -> TimerState {
        self.inner.state.load()
    }

    fn arm(&self, ticks: u64) -> RtosResult<u64> {
        if FaultPlan::is_set(&self.faults.fail_arm) {
            return Err(RtosError::arm_failed(self.inner.id, "injected fault"));
        }
        self.inner.arms.lock().push(ticks);
        Ok(self.inner.state.arm())
    }

    fn stop(&self) -> RtosResult<()> {
        if FaultPlan::is_set(&self.faults.fail_stop) {
            return Err(RtosError::stop_failed(self.inner.id, "injected fault"));
        }
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.state.stop();
        Ok(())
    }
}

/// Semaphore with injectable faults; blocking behaviour is real.
#[derive(Debug, Clone)]
pub struct ManualSemaphore {
    inner: Arc<SoftwareSemaphore>,
    faults: Arc<FaultPlan>,
}

impl ManualSemaphore {
    /// Number of tasks currently blocked in `pend`.
    #[must_use]
    pub fn waiters(&self) -> u32 {
        self.inner.waiters()
    }

    /// Consume a release if one is banked, without blocking.
    pub fn try_pend(&self) -> bool {
        self.inner.try_pend()
    }

    /// Wait at most `timeout` for a release.
    pub fn pend_timeout(&self, timeout: Duration) -> bool {
        self.inner.pend_timeout(timeout)
    }
}

impl CountingSemaphore for ManualSemaphore {
    fn pend(&self) -> RtosResult<()> {
        if FaultPlan::is_set(&self.faults.fail_pend) {
            return Err(RtosError::wait_failed("injected fault"));
        }
        self.inner.pend()
    }

    fn post_all(&self) -> RtosResult<()> {
        if FaultPlan::is_set(&self.faults.fail_post) {
            return Err(RtosError::post_failed("injected fault"));
        }
        self.inner.post_all()
    }

    fn count(&self) -> u32 {
        self.inner.count()
    }
}

#[derive(Debug, Default)]
struct ManualShared {
    tick_rate_hz: AtomicU32,
    faults: Arc<FaultPlan>,
    timers: Mutex<Vec<ManualTimer>>,
    semaphores: Mutex<Vec<ManualSemaphore>>,
}

/// RTOS whose timer service runs only when the caller says so.
///
/// Cloning shares the same timers, semaphores and fault plan, so a test can keep a
/// handle while the code under test owns another.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use vmwake_rtos::prelude::*;
///
/// let rtos = ManualRtos::new(1000);
/// let fires = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&fires);
/// let timer = rtos.create_timer("wake", 1, Arc::new(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }))?;
///
/// timer.arm(10)?;
/// assert!(timer.fire().is_some());
/// assert!(timer.fire().is_none());
/// assert_eq!(fires.load(Ordering::SeqCst), 1);
/// # Ok::<(), RtosError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManualRtos {
    shared: Arc<ManualShared>,
}

impl ManualRtos {
    /// Create a manual RTOS with the given timer tick rate.
    #[must_use]
    pub fn new(tick_rate_hz: u32) -> Self {
        Self {
            shared: Arc::new(ManualShared {
                tick_rate_hz: AtomicU32::new(tick_rate_hz),
                ..ManualShared::default()
            }),
        }
    }

    /// Change the reported tick rate.
    pub fn set_tick_rate_hz(&self, hz: u32) {
        self.shared.tick_rate_hz.store(hz, Ordering::SeqCst);
    }

    /// Shared fault switches.
    #[must_use]
    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }

    /// Most recently created timer.
    #[must_use]
    pub fn last_timer(&self) -> Option<ManualTimer> {
        self.shared.timers.lock().last().cloned()
    }

    /// Most recently created semaphore.
    #[must_use]
    pub fn last_semaphore(&self) -> Option<ManualSemaphore> {
        self.shared.semaphores.lock().last().cloned()
    }

    /// Number of timers created so far.
    #[must_use]
    pub fn timers_created(&self) -> usize {
        self.shared.timers.lock().len()
    }

    /// Number of semaphores created so far.
    #[must_use]
    pub fn semaphores_created(&self) -> usize {
        self.shared.semaphores.lock().len()
    }

    /// Expire the most recently created timer.
    pub fn fire_timer(&self) -> Option<TimerFire> {
        self.last_timer().and_then(|timer| timer.fire())
    }
}

impl Rtos for ManualRtos {
    type Timer = ManualTimer;
    type Semaphore = ManualSemaphore;

    fn timer_tick_rate(&self) -> TickRate {
        TickRate::from_hz(self.shared.tick_rate_hz.load(Ordering::SeqCst))
    }

    fn create_timer(
        &self,
        name: &'static str,
        initial_ticks: u64,
        callback: TimerCallback,
    ) -> RtosResult<Self::Timer> {
        if FaultPlan::is_set(&self.shared.faults.fail_timer_create) {
            return Err(RtosError::timer_create_failed(name, "injected fault"));
        }
        let timer = ManualTimer {
            inner: Arc::new(ManualTimerInner {
                id: TimerId::next(),
                name,
                initial_ticks,
                state: AtomicTimerState::new(),
                callback,
                arms: Mutex::new(Vec::new()),
                stops: AtomicU64::new(0),
            }),
            faults: Arc::clone(&self.shared.faults),
        };
        self.shared.timers.lock().push(timer.clone());
        Ok(timer)
    }

    fn create_semaphore(
        &self,
        name: &'static str,
        initial_count: u32,
    ) -> RtosResult<Self::Semaphore> {
        if FaultPlan::is_set(&self.shared.faults.fail_semaphore_create) {
            return Err(RtosError::semaphore_create_failed(name, "injected fault"));
        }
        let semaphore = ManualSemaphore {
            inner: Arc::new(SoftwareSemaphore::new(name, initial_count)),
            faults: Arc::clone(&self.shared.faults),
        };
        self.shared.semaphores.lock().push(semaphore.clone());
        Ok(semaphore)
    }
}

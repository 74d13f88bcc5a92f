//! The scheduling bridge between the VM's cooperative scheduler and the RTOS.
//!
//! The VM task calls in to record deadlines and to idle; the timer-service context
//! calls back when the wake timer expires; any context may wake the VM.
//!
//! # Locking
//!
//! One mutex guards the deadline tracker and the wake timer's identity. A schedule
//! request holds it across the decision and the stop/arm it implies, and the
//! expiry callback takes it before touching the tracker, so an expiry can never
//! interleave with a rearm. The scheduler is always notified with the lock released.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use vmwake_rtos::{OneShotTimer, Rtos, TaskId, TimerCallback, TimerFire, TimerId, TimerState};

use crate::clock::{ClockSource, MonotonicClock, SystemClock};
use crate::config::{BridgeConfig, ShutdownPolicy};
use crate::counters::{BridgeCounters, CounterSnapshot};
use crate::error::{BridgeError, BridgeResult, Operation, Primitive};
use crate::tracker::{DeadlineTracker, Decision, FireOutcome};
use crate::wake_signal::{WakeHandle, WakeSignal};
use crate::wake_timer::WakeTimer;

/// Name given to the wake timer.
pub const WAKE_TIMER_NAME: &str = "VM wake up";
/// Name given to the wake signal.
pub const WAKE_SIGNAL_NAME: &str = "VM wake signal";

/// Receives "re-evaluate your queue" notifications.
///
/// Called from the VM task (elapsed deadlines) or from the timer-service context
/// (timer expiry). Implementations must not block.
pub trait SchedulerNotifier: Send + Sync {
    /// Ask the scheduler to re-evaluate its queue.
    fn notify(&self);
}

impl<F> SchedulerNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn notify(&self) {
        self();
    }
}

struct ArmState {
    tracker: DeadlineTracker,
    timer: Option<TimerId>,
}

struct Shared {
    arm: Mutex<ArmState>,
    notifier: Box<dyn SchedulerNotifier>,
    counters: Arc<BridgeCounters>,
    notify_on_stale_fire: bool,
}

impl Shared {
    fn on_timer_fire(&self, fire: TimerFire) {
        let outcome = {
            let mut arm = self.arm.lock();
            if arm.timer != Some(fire.timer) {
                None
            } else {
                Some(arm.tracker.on_fire(fire.generation))
            }
        };

        match outcome {
            None => {
                self.counters.inc_foreign_fire();
                debug!(timer = %fire.timer, "ignoring expiry of foreign timer");
            }
            Some(FireOutcome::Current) => {
                self.counters.inc_timer_notification();
                trace!(timer = %fire.timer, generation = fire.generation, "wake timer expired");
                self.notifier.notify();
            }
            Some(FireOutcome::Stale) => {
                self.counters.inc_stale_fire();
                debug!(
                    timer = %fire.timer,
                    generation = fire.generation,
                    "expiry of superseded arm"
                );
                if self.notify_on_stale_fire {
                    self.notifier.notify();
                }
            }
        }
    }
}

struct Primitives<R: Rtos> {
    timer: WakeTimer<R::Timer>,
    signal: WakeSignal<R::Semaphore>,
}

enum Lifecycle<R: Rtos> {
    Uninitialized,
    Running(Arc<Primitives<R>>),
    ShutDown,
}

impl<R: Rtos> Lifecycle<R> {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running(_) => "running",
            Self::ShutDown => "shut down",
        }
    }
}

/// Bridges a VM's cooperative scheduler to one RTOS wake timer and one semaphore.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use vmwake_bridge::prelude::*;
/// use vmwake_rtos::ManualRtos;
///
/// let rtos = ManualRtos::new(1000);
/// let clock = ManualClock::starting_at_ms(1_000);
/// let notified = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&notified);
///
/// let bridge = SchedulingBridge::with_clock(
///     rtos.clone(),
///     clock.clone(),
///     BridgeConfig::default(),
///     move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     },
/// );
/// bridge.initialize()?;
///
/// bridge.schedule_request(1_050)?;
/// assert_eq!(bridge.next_wake_deadline(), Some(1_050));
///
/// clock.advance_ms(50);
/// rtos.fire_timer();
/// assert_eq!(notified.load(Ordering::SeqCst), 1);
/// # Ok::<(), BridgeError>(())
/// ```
pub struct SchedulingBridge<R: Rtos, C = SystemClock> {
    rtos: R,
    clock: ClockSource<C>,
    config: BridgeConfig,
    shared: Arc<Shared>,
    lifecycle: RwLock<Lifecycle<R>>,
    vm_task: Mutex<Option<TaskId>>,
}

impl<R: Rtos> SchedulingBridge<R, SystemClock> {
    /// Create a bridge reading the host monotonic clock.
    pub fn new(rtos: R, config: BridgeConfig, notifier: impl SchedulerNotifier + 'static) -> Self {
        Self::with_clock(rtos, SystemClock::new(), config, notifier)
    }
}

impl<R: Rtos, C: MonotonicClock> SchedulingBridge<R, C> {
    /// Create a bridge reading `clock`.
    ///
    /// No primitive is created until [`initialize`](Self::initialize).
    pub fn with_clock(
        rtos: R,
        clock: C,
        config: BridgeConfig,
        notifier: impl SchedulerNotifier + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            arm: Mutex::new(ArmState {
                tracker: DeadlineTracker::new(),
                timer: None,
            }),
            notifier: Box::new(notifier),
            counters: Arc::new(BridgeCounters::new()),
            notify_on_stale_fire: config.notify_on_stale_fire,
        });
        Self {
            rtos,
            clock: ClockSource::new(clock),
            config,
            shared,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            vm_task: Mutex::new(None),
        }
    }

    /// Create the wake timer and wake signal.
    ///
    /// Must run once, before the VM task starts.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Configuration`] if the config is invalid or the timer
    ///   service tick rate is zero
    /// - [`BridgeError::PrimitiveCreation`] if the platform cannot create either primitive
    /// - [`BridgeError::AlreadyInitialized`] or [`BridgeError::ShutDown`] on a repeat call
    pub fn initialize(&self) -> BridgeResult<()> {
        let mut lifecycle = self.lifecycle.write();
        match &*lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Running(_) => return Err(BridgeError::AlreadyInitialized),
            Lifecycle::ShutDown => return Err(BridgeError::ShutDown),
        }

        self.config.validate()?;
        let tick_rate = self.rtos.timer_tick_rate();
        if !tick_rate.is_enabled() {
            warn!("timer service tick rate is 0 Hz");
            return Err(BridgeError::configuration(
                "timer service tick rate must be greater than 0",
            ));
        }

        let shared = Arc::clone(&self.shared);
        let callback: TimerCallback = Arc::new(move |fire| shared.on_timer_fire(fire));
        let initial_ticks = tick_rate.ms_to_ticks_ceil(self.config.initial_timer_delay_ms);
        let timer = self
            .rtos
            .create_timer(WAKE_TIMER_NAME, initial_ticks, callback)
            .map_err(|source| BridgeError::creation(Primitive::WakeTimer, source))?;
        let semaphore = self
            .rtos
            .create_semaphore(WAKE_SIGNAL_NAME, 0)
            .map_err(|source| BridgeError::creation(Primitive::WakeSignal, source))?;

        let timer_id = timer.id();
        self.shared.arm.lock().timer = Some(timer_id);
        *lifecycle = Lifecycle::Running(Arc::new(Primitives {
            timer: WakeTimer::new(timer, tick_rate),
            signal: WakeSignal::new(semaphore, Arc::clone(&self.shared.counters)),
        }));

        info!(
            tick_rate = %tick_rate,
            timer = %timer_id,
            initial_ticks,
            "scheduling bridge initialized"
        );
        Ok(())
    }

    /// Record the calling context as the VM task. Always succeeds.
    pub fn vm_task_started(&self) -> BridgeResult<()> {
        let task = self.rtos.current_task_id();
        *self.vm_task.lock() = Some(task);
        debug!(%task, "VM task started");
        Ok(())
    }

    /// Ensure the scheduler is notified no later than `absolute_deadline_ms`.
    ///
    /// A deadline that has already elapsed notifies synchronously. Otherwise the
    /// wake timer is armed for the earliest outstanding deadline.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::PrimitiveOperation`] if stopping or arming the timer
    /// fails, or a lifecycle error if the bridge is not running.
    pub fn schedule_request(&self, absolute_deadline_ms: i64) -> BridgeResult<()> {
        let primitives = self.primitives()?;
        let now = self.clock.monotonic_ms();
        let counters = &self.shared.counters;

        let mut arm = self.shared.arm.lock();
        match arm.tracker.decide(absolute_deadline_ms, now) {
            Decision::NotifyNow => {
                let stopped = primitives.timer.stop_if_armed();
                drop(arm);

                counters.inc_immediate_notification();
                trace!(deadline = absolute_deadline_ms, now, "deadline elapsed, notifying now");
                self.shared.notifier.notify();

                match stopped {
                    Ok(true) => {
                        counters.inc_stop();
                        Ok(())
                    }
                    Ok(false) => Ok(()),
                    Err(source) => {
                        counters.inc_failure();
                        warn!(error = %source, "failed to stop wake timer");
                        Err(BridgeError::operation(Operation::Stop, source))
                    }
                }
            }
            Decision::Rearm { relative_ms } => {
                match primitives.timer.stop_if_armed() {
                    Ok(true) => counters.inc_stop(),
                    Ok(false) => {}
                    Err(source) => {
                        arm.tracker.abandon_arm();
                        counters.inc_failure();
                        warn!(error = %source, "failed to stop wake timer before rearm");
                        return Err(BridgeError::operation(Operation::Stop, source));
                    }
                }

                match primitives.timer.arm_after_ms(relative_ms) {
                    Ok(generation) => {
                        arm.tracker.record_arm(generation);
                        counters.inc_arm();
                        debug!(
                            deadline = absolute_deadline_ms,
                            relative_ms,
                            ticks = primitives.timer.ticks_for(relative_ms),
                            generation,
                            "wake timer armed"
                        );
                        Ok(())
                    }
                    Err(source) => {
                        arm.tracker.abandon_arm();
                        counters.inc_failure();
                        warn!(
                            error = %source,
                            deadline = absolute_deadline_ms,
                            "failed to arm wake timer"
                        );
                        Err(BridgeError::operation(Operation::Arm, source))
                    }
                }
            }
            Decision::Keep => {
                counters.inc_keep();
                trace!(
                    deadline = absolute_deadline_ms,
                    pending = ?arm.tracker.next_wake_deadline(),
                    "earlier wake already pending"
                );
                Ok(())
            }
        }
    }

    /// Block the calling VM task until the wake signal is released.
    ///
    /// # Errors
    ///
    /// Returns a wait error if the platform rejects the pend, or a lifecycle error
    /// if the bridge is not running.
    pub fn idle_vm(&self) -> BridgeResult<()> {
        let primitives = self.primitives()?;
        primitives.signal.wait()
    }

    /// Release the VM task from any context. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns a post error if the platform rejects the release, or a lifecycle
    /// error if the bridge is not running.
    pub fn wakeup_vm(&self) -> BridgeResult<()> {
        let primitives = self.primitives()?;
        primitives.signal.release()
    }

    /// Acknowledge a wakeup. Nothing to do on this platform.
    pub fn ack_wakeup(&self) -> BridgeResult<()> {
        trace!("wakeup acknowledged");
        Ok(())
    }

    /// Identifier of the calling execution context.
    #[must_use]
    pub fn current_task_id(&self) -> TaskId {
        self.rtos.current_task_id()
    }

    /// Set the offset added to application time.
    pub fn set_application_time(&self, offset_ms: i64) {
        self.clock.set_application_time(offset_ms);
        debug!(offset_ms, "application time offset set");
    }

    /// Current time in milliseconds, application time if `use_app_offset`.
    #[must_use]
    pub fn current_time(&self, use_app_offset: bool) -> i64 {
        self.clock.current_time(use_app_offset)
    }

    /// Raw monotonic time in nanoseconds.
    #[must_use]
    pub fn time_nanos(&self) -> i64 {
        self.clock.time_nanos()
    }

    /// Tear down according to the configured [`ShutdownPolicy`].
    ///
    /// # Errors
    ///
    /// Under [`ShutdownPolicy::Release`], returns a stop error if the pending timer
    /// could not be cancelled. The primitives are dropped regardless.
    pub fn shutdown(&self) -> BridgeResult<()> {
        match self.config.shutdown_policy {
            ShutdownPolicy::Retain => {
                info!("scheduling bridge shutdown, primitives retained");
                Ok(())
            }
            ShutdownPolicy::Release => {
                let previous =
                    std::mem::replace(&mut *self.lifecycle.write(), Lifecycle::ShutDown);
                let primitives = match previous {
                    Lifecycle::Running(primitives) => primitives,
                    other => {
                        info!(state = other.name(), "scheduling bridge shutdown");
                        return Ok(());
                    }
                };

                let stopped = {
                    let mut arm = self.shared.arm.lock();
                    arm.tracker.reset();
                    arm.timer = None;
                    primitives.timer.stop_if_armed()
                };
                info!("scheduling bridge shutdown, primitives released");
                stopped.map(|_| ()).map_err(|source| {
                    self.shared.counters.inc_failure();
                    BridgeError::operation(Operation::Stop, source)
                })
            }
        }
    }

    /// A handle that wakes the VM task from other threads or callbacks.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the bridge is not running.
    pub fn wake_handle(&self) -> BridgeResult<WakeHandle<R::Semaphore>> {
        Ok(self.primitives()?.signal.handle())
    }

    /// Deadline the armed wake timer will deliver, if any.
    #[must_use]
    pub fn next_wake_deadline(&self) -> Option<i64> {
        self.shared.arm.lock().tracker.next_wake_deadline()
    }

    /// Whether the last arm expired with no newer arm since.
    #[must_use]
    pub fn timer_fired(&self) -> bool {
        self.shared.arm.lock().tracker.timer_fired()
    }

    /// State of the wake timer, if it exists.
    #[must_use]
    pub fn timer_state(&self) -> Option<TimerState> {
        self.primitives().ok().map(|p| p.timer.state())
    }

    /// The context recorded by [`vm_task_started`](Self::vm_task_started).
    #[must_use]
    pub fn vm_task_id(&self) -> Option<TaskId> {
        *self.vm_task.lock()
    }

    /// Whether the primitives exist.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(*self.lifecycle.read(), Lifecycle::Running(_))
    }

    /// Activity counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The clock and application offset.
    #[must_use]
    pub fn clock(&self) -> &ClockSource<C> {
        &self.clock
    }

    fn primitives(&self) -> BridgeResult<Arc<Primitives<R>>> {
        match &*self.lifecycle.read() {
            Lifecycle::Running(primitives) => Ok(Arc::clone(primitives)),
            Lifecycle::Uninitialized => Err(BridgeError::NotInitialized),
            Lifecycle::ShutDown => Err(BridgeError::ShutDown),
        }
    }
}

impl<R: Rtos, C: fmt::Debug> fmt::Debug for SchedulingBridge<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingBridge")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .field("state", &self.lifecycle.read().name())
            .field("vm_task", &*self.vm_task.lock())
            .finish_non_exhaustive()
    }
}

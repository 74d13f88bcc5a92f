//! Software RTOS implementation.
//!
//! This module provides `SoftwareRtos`, a host implementation of the [`Rtos`] trait
//! backed by a dedicated timer-service thread. It stands in for an RTOS timer task
//! when running on a desktop OS, in simulations and in timing tests.

use core::cmp::Ordering;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{RtosError, RtosResult};
use crate::rtos::Rtos;
use crate::semaphore::SoftwareSemaphore;
use crate::tick::TickRate;
use crate::timer::{AtomicTimerState, OneShotTimer, TimerCallback, TimerFire, TimerId, TimerState};

/// Horizon used when a countdown does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration for [`SoftwareRtos`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareRtosConfig {
    /// Timer-service tick rate in Hz. Zero disables timer creation.
    pub timer_tick_rate_hz: u32,
    /// Name of the timer-service thread.
    pub service_thread_name: String,
}

impl Default for SoftwareRtosConfig {
    fn default() -> Self {
        Self {
            timer_tick_rate_hz: 1000,
            service_thread_name: "timer-service".to_string(),
        }
    }
}

impl SoftwareRtosConfig {
    /// Set the tick rate.
    #[must_use]
    pub fn with_tick_rate_hz(mut self, hz: u32) -> Self {
        self.timer_tick_rate_hz = hz;
        self
    }

    /// Set the service thread name.
    #[must_use]
    pub fn with_service_thread_name(mut self, name: impl Into<String>) -> Self {
        self.service_thread_name = name.into();
        self
    }
}

struct TimerSlot {
    id: TimerId,
    name: &'static str,
    state: AtomicTimerState,
    callback: TimerCallback,
}

impl fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerSlot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

struct PendingExpiry {
    deadline: Instant,
    generation: u64,
    slot: Arc<TimerSlot>,
}

impl PendingExpiry {
    fn is_pending(&self) -> bool {
        self.slot.state.is_pending(self.generation)
    }
}

impl PartialEq for PendingExpiry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingExpiry {}

impl PartialOrd for PendingExpiry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingExpiry {
    // Reversed so the max-heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

enum Command {
    Arm(PendingExpiry),
    Prune,
    Shutdown,
}

/// One-shot timer serviced by the [`SoftwareRtos`] timer thread.
#[derive(Debug)]
pub struct SoftwareTimer {
    slot: Arc<TimerSlot>,
    tick_rate: TickRate,
    initial_ticks: u64,
    commands: Sender<Command>,
}

impl SoftwareTimer {
    /// Name given at creation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.slot.name
    }

    /// Countdown supplied at creation.
    #[must_use]
    pub fn initial_ticks(&self) -> u64 {
        self.initial_ticks
    }
}

impl OneShotTimer for SoftwareTimer {
    fn id(&self) -> TimerId {
        self.slot.id
    }

    fn state(&self) -> TimerState {
        self.slot.state.load()
    }

    fn arm(&self, ticks: u64) -> RtosResult<u64> {
        let now = Instant::now();
        let delay = self.tick_rate.ticks_to_duration(ticks);
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .ok_or_else(|| RtosError::arm_failed(self.slot.id, "countdown out of range"))?;

        let generation = self.slot.state.arm();
        let expiry = PendingExpiry {
            deadline,
            generation,
            slot: Arc::clone(&self.slot),
        };
        if self.commands.send(Command::Arm(expiry)).is_err() {
            self.slot.state.stop();
            return Err(RtosError::ServiceStopped);
        }
        trace!(timer = %self.slot.id, ticks, generation, "timer armed");
        Ok(generation)
    }

    fn stop(&self) -> RtosResult<()> {
        self.slot.state.stop();
        // Ignored: a stopped service holds no expiries
        drop(self.commands.send(Command::Prune));
        trace!(timer = %self.slot.id, "timer stopped");
        Ok(())
    }
}

/// Host RTOS with a dedicated timer-service thread.
///
/// Timer callbacks execute on the service thread. Dropping the `SoftwareRtos` stops
/// the thread; timers armed afterwards report [`RtosError::ServiceStopped`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use vmwake_rtos::prelude::*;
///
/// let rtos = SoftwareRtos::new(SoftwareRtosConfig::default())?;
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// let timer = rtos.create_timer("wake", 1, Arc::new(move |_| flag.store(true, Ordering::SeqCst)))?;
///
/// timer.arm(1)?;
/// while !fired.load(Ordering::SeqCst) {
///     std::thread::yield_now();
/// }
/// assert_eq!(timer.state(), TimerState::Fired);
/// # Ok::<(), RtosError>(())
/// ```
#[derive(Debug)]
pub struct SoftwareRtos {
    config: SoftwareRtosConfig,
    commands: Sender<Command>,
    service: Option<JoinHandle<()>>,
}

impl SoftwareRtos {
    /// Start the timer service.
    ///
    /// # Errors
    ///
    /// Returns an error if the service thread cannot be spawned.
    pub fn new(config: SoftwareRtosConfig) -> RtosResult<Self> {
        let (commands, inbox) = channel::unbounded();
        let service = thread::Builder::new()
            .name(config.service_thread_name.clone())
            .spawn(move || run_timer_service(&inbox))
            .map_err(|e| RtosError::timer_create_failed("timer-service", e.to_string()))?;

        debug!(
            tick_rate_hz = config.timer_tick_rate_hz,
            thread = %config.service_thread_name,
            "software timer service started"
        );

        Ok(Self {
            config,
            commands,
            service: Some(service),
        })
    }

    /// Start the timer service with a given tick rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the service thread cannot be spawned.
    pub fn with_tick_rate_hz(hz: u32) -> RtosResult<Self> {
        Self::new(SoftwareRtosConfig::default().with_tick_rate_hz(hz))
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &SoftwareRtosConfig {
        &self.config
    }
}

impl Rtos for SoftwareRtos {
    type Timer = SoftwareTimer;
    type Semaphore = SoftwareSemaphore;

    fn timer_tick_rate(&self) -> TickRate {
        TickRate::from_hz(self.config.timer_tick_rate_hz)
    }

    fn create_timer(
        &self,
        name: &'static str,
        initial_ticks: u64,
        callback: TimerCallback,
    ) -> RtosResult<Self::Timer> {
        let tick_rate = self.timer_tick_rate();
        if !tick_rate.is_enabled() {
            return Err(RtosError::TimerServiceDisabled);
        }
        Ok(SoftwareTimer {
            slot: Arc::new(TimerSlot {
                id: TimerId::next(),
                name,
                state: AtomicTimerState::new(),
                callback,
            }),
            tick_rate,
            initial_ticks,
            commands: self.commands.clone(),
        })
    }

    fn create_semaphore(
        &self,
        name: &'static str,
        initial_count: u32,
    ) -> RtosResult<Self::Semaphore> {
        Ok(SoftwareSemaphore::new(name, initial_count))
    }
}

impl Drop for SoftwareRtos {
    fn drop(&mut self) {
        // Ignored: the service may already have exited
        drop(self.commands.send(Command::Shutdown));
        if let Some(service) = self.service.take()
            && service.thread().id() != thread::current().id()
            && service.join().is_err()
        {
            debug!("timer service thread panicked");
        }
    }
}

fn run_timer_service(inbox: &Receiver<Command>) {
    let mut pending: BinaryHeap<PendingExpiry> = BinaryHeap::new();

    loop {
        let received = match pending.peek() {
            Some(next) => inbox.recv_deadline(next.deadline),
            None => inbox.recv().map_err(|_disconnected| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Arm(expiry)) => {
                pending.retain(PendingExpiry::is_pending);
                pending.push(expiry);
            }
            Ok(Command::Prune) => pending.retain(PendingExpiry::is_pending),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        while pending.peek().is_some_and(|next| next.deadline <= now) {
            if let Some(expiry) = pending.pop() {
                expire(&expiry);
            }
        }
    }

    debug!(abandoned = pending.len(), "software timer service stopped");
}

fn expire(expiry: &PendingExpiry) {
    let slot = &expiry.slot;
    if !slot.state.try_fire(expiry.generation) {
        trace!(timer = %slot.id, generation = expiry.generation, "expiry superseded");
        return;
    }
    trace!(timer = %slot.id, generation = expiry.generation, "timer fired");
    (slot.callback)(TimerFire {
        timer: slot.id,
        generation: expiry.generation,
    });
}

//! The platform seam: how the bridge obtains its timer and semaphore.

use crate::error::RtosResult;
use crate::semaphore::CountingSemaphore;
use crate::task::TaskId;
use crate::tick::TickRate;
use crate::timer::{OneShotTimer, TimerCallback};

/// RTOS capabilities consumed by the VM wake bridge.
///
/// An implementation owns the timer-service context: callbacks registered through
/// [`create_timer`](Rtos::create_timer) run there, never on the arming thread.
pub trait Rtos: Send + Sync {
    /// Timer type produced by this platform.
    type Timer: OneShotTimer + 'static;
    /// Semaphore type produced by this platform.
    type Semaphore: CountingSemaphore + 'static;

    /// Configured tick rate of the timer service. Zero means disabled.
    fn timer_tick_rate(&self) -> TickRate;

    /// Create an idle one-shot timer.
    ///
    /// `initial_ticks` is the countdown used if the timer is started without an
    /// explicit arm; callers that always arm explicitly may pass a placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot allocate the timer.
    fn create_timer(
        &self,
        name: &'static str,
        initial_ticks: u64,
        callback: TimerCallback,
    ) -> RtosResult<Self::Timer>;

    /// Create a counting semaphore holding `initial_count` releases.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot allocate the semaphore.
    fn create_semaphore(
        &self,
        name: &'static str,
        initial_count: u32,
    ) -> RtosResult<Self::Semaphore>;

    /// Identifier of the calling execution context.
    fn current_task_id(&self) -> TaskId {
        TaskId::current()
    }
}

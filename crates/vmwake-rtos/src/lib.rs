//! # vmwake-rtos
//!
//! The RTOS capabilities consumed by the VM wake bridge: a one-shot relative timer
//! serviced from a timer-task context, and a counting semaphore the VM task blocks on.
//!
//! This crate provides:
//! - [`Rtos`] - the platform seam that creates timers and semaphores
//! - [`OneShotTimer`] and [`CountingSemaphore`] - the primitive contracts
//! - [`TickRate`] - millisecond to tick conversion with ceiling rounding
//! - [`SoftwareRtos`] - a threaded host implementation with a real timer service
//! - [`ManualRtos`] - a deterministic implementation whose timers fire on demand
//!
//! ## Execution Contexts
//!
//! Timer callbacks run in the timer-service context, never on the thread that armed
//! the timer. `arm()` and `stop()` never wait for a callback that is already running,
//! so a caller may hold its own lock across them while the callback contends for it.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vmwake_rtos::prelude::*;
//!
//! let rtos = SoftwareRtos::new(SoftwareRtosConfig::default())?;
//! let timer = rtos.create_timer("wake", 1, Arc::new(|_fire: TimerFire| {}))?;
//! let semaphore = rtos.create_semaphore("wake", 0)?;
//!
//! let ticks = rtos.timer_tick_rate().ms_to_ticks_ceil(5);
//! timer.arm(ticks)?;
//! semaphore.post_all()?;
//! semaphore.pend()?;
//! # Ok::<(), RtosError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod manual;
pub mod prelude;
pub mod rtos;
pub mod semaphore;
pub mod software_impl;
pub mod task;
pub mod tick;
pub mod timer;

pub use error::{RtosError, RtosResult};
pub use manual::{FaultPlan, ManualRtos, ManualSemaphore, ManualTimer};
pub use rtos::Rtos;
pub use semaphore::{CountingSemaphore, SoftwareSemaphore};
pub use software_impl::{SoftwareRtos, SoftwareRtosConfig, SoftwareTimer};
pub use task::TaskId;
pub use tick::TickRate;
pub use timer::{AtomicTimerState, OneShotTimer, TimerCallback, TimerFire, TimerId, TimerState};

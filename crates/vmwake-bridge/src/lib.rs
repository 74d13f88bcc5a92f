//! # vmwake-bridge
//!
//! Connects a cooperative VM scheduler to an RTOS. The VM runs in a single task;
//! when it has nothing to do it asks to be woken by a deadline and blocks. This
//! crate keeps one one-shot timer armed for the earliest outstanding deadline and
//! provides the semaphore handshake that lets a timer expiry or an external event
//! release the idle VM task.
//!
//! - [`SchedulingBridge`] - the entry points the VM port calls
//! - [`DeadlineTracker`] - pure decision logic for schedule requests and expiries
//! - [`WakeTimer`] and [`WakeSignal`] - thin wrappers over the RTOS primitives
//! - [`ClockSource`] - monotonic time plus the application-time offset
//! - [`BridgeConfig`] - placeholder delay, stale-expiry and shutdown policy
//!
//! # Guarantees
//!
//! - At most one wake timer is armed, always for the earliest pending deadline
//! - Timer delays are rounded up to whole ticks, so the scheduler is never woken early
//! - A deadline that has already elapsed notifies the scheduler synchronously
//! - A release posted before the VM blocks is banked, so no wakeup is lost
//! - An expiry belonging to a stopped or replaced arm never marks the tracker fired
//!
//! # Example
//!
//! ```rust
//! use vmwake_bridge::prelude::*;
//! use vmwake_rtos::{SoftwareRtos, SoftwareRtosConfig};
//!
//! let rtos = SoftwareRtos::new(SoftwareRtosConfig::default())?;
//! let bridge = SchedulingBridge::new(rtos, BridgeConfig::default(), || {});
//! bridge.initialize()?;
//! bridge.vm_task_started()?;
//!
//! let now = bridge.current_time(false);
//! bridge.schedule_request(now + 5)?;
//!
//! bridge.wakeup_vm()?;
//! bridge.idle_vm()?;
//! assert!(Status::from(bridge.ack_wakeup()).is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
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

pub mod bridge;
pub mod clock;
pub mod config;
pub mod counters;
pub mod error;
pub mod prelude;
pub mod tracker;
pub mod wake_signal;
pub mod wake_timer;

pub use bridge::{SchedulerNotifier, SchedulingBridge, WAKE_SIGNAL_NAME, WAKE_TIMER_NAME};
pub use clock::{ClockSource, ManualClock, MonotonicClock, SystemClock};
pub use config::{BridgeConfig, BridgeConfigBuilder, ShutdownPolicy};
pub use counters::{BridgeCounters, CounterSnapshot};
pub use error::{BridgeError, BridgeResult, ErrorKind, Operation, Primitive, Status};
pub use tracker::{DeadlineTracker, Decision, FireOutcome, NO_PENDING_WAKE};
pub use wake_signal::{WakeHandle, WakeSignal};
pub use wake_timer::WakeTimer;

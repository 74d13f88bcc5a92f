//! Prelude module for common bridge types.
//!
//! Brings the bridge, its configuration, clocks and error types into scope.

pub use crate::bridge::{SchedulerNotifier, SchedulingBridge};
pub use crate::clock::{ClockSource, ManualClock, MonotonicClock, SystemClock};
pub use crate::config::{BridgeConfig, ShutdownPolicy};
pub use crate::counters::CounterSnapshot;
pub use crate::error::{BridgeError, BridgeResult, ErrorKind, Status};
pub use crate::wake_signal::WakeHandle;

//! Prelude for vmwake-rtos.
//!
//! Re-exports the traits and types needed to create and drive primitives.

pub use crate::error::{RtosError, RtosResult};
pub use crate::manual::{FaultPlan, ManualRtos, ManualSemaphore, ManualTimer};
pub use crate::rtos::Rtos;
pub use crate::semaphore::{CountingSemaphore, SoftwareSemaphore};
pub use crate::software_impl::{SoftwareRtos, SoftwareRtosConfig, SoftwareTimer};
pub use crate::task::TaskId;
pub use crate::tick::TickRate;
pub use crate::timer::{OneShotTimer, TimerCallback, TimerFire, TimerId, TimerState};

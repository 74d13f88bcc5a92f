//! Error types for RTOS primitive operations.

use thiserror::Error;

use crate::timer::TimerId;

/// Errors reported by timer and semaphore primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtosError {
    /// The timer service is disabled (tick rate of zero).
    #[error("Timer service disabled: tick rate is 0 Hz")]
    TimerServiceDisabled,

    /// A timer or semaphore could not be created.
    #[error("Failed to create {kind} '{name}': {reason}")]
    CreateFailed {
        /// Primitive kind (`"timer"` or `"semaphore"`).
        kind: &'static str,
        /// Name given at creation.
        name: &'static str,
        /// Platform reason.
        reason: String,
    },

    /// Arming (or rearming) a timer failed.
    #[error("Failed to arm timer {0}: {1}")]
    ArmFailed(TimerId, String),

    /// Stopping a timer failed.
    #[error("Failed to stop timer {0}: {1}")]
    StopFailed(TimerId, String),

    /// A blocking wait reported a platform fault.
    #[error("Semaphore wait failed: {0}")]
    WaitFailed(String),

    /// A release could not be posted.
    #[error("Semaphore post failed: {0}")]
    PostFailed(String),

    /// Posting would overflow the semaphore count.
    #[error("Semaphore count would overflow")]
    CountOverflow,

    /// The timer service has been shut down.
    #[error("Timer service stopped")]
    ServiceStopped,
}

impl RtosError {
    /// Create a timer creation error.
    #[must_use]
    pub fn timer_create_failed(name: &'static str, reason: impl Into<String>) -> Self {
        Self::CreateFailed {
            kind: "timer",
            name,
            reason: reason.into(),
        }
    }

    /// Create a semaphore creation error.
    #[must_use]
    pub fn semaphore_create_failed(name: &'static str, reason: impl Into<String>) -> Self {
        Self::CreateFailed {
            kind: "semaphore",
            name,
            reason: reason.into(),
        }
    }

    /// Create an arm failure.
    #[must_use]
    pub fn arm_failed(timer: TimerId, reason: impl Into<String>) -> Self {
        Self::ArmFailed(timer, reason.into())
    }

    /// Create a stop failure.
    #[must_use]
    pub fn stop_failed(timer: TimerId, reason: impl Into<String>) -> Self {
        Self::StopFailed(timer, reason.into())
    }

    /// Create a wait failure.
    #[must_use]
    pub fn wait_failed(reason: impl Into<String>) -> Self {
        Self::WaitFailed(reason.into())
    }

    /// Create a post failure.
    #[must_use]
    pub fn post_failed(reason: impl Into<String>) -> Self {
        Self::PostFailed(reason.into())
    }

    /// Check if this error was raised while creating a primitive.
    #[must_use]
    pub fn is_creation_error(&self) -> bool {
        matches!(self, Self::CreateFailed { .. } | Self::TimerServiceDisabled)
    }
}

/// A specialized `Result` type for RTOS primitive operations.
pub type RtosResult<T> = std::result::Result<T, RtosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RtosError::timer_create_failed("wake", "out of timers");
        assert_eq!(
            err.to_string(),
            "Failed to create timer 'wake': out of timers"
        );

        let err = RtosError::wait_failed("object deleted");
        assert!(err.to_string().contains("object deleted"));
    }

    #[test]
    fn test_error_constructors() {
        let err = RtosError::semaphore_create_failed("wake", "no memory");
        assert!(matches!(err, RtosError::CreateFailed { kind: "semaphore", .. }));
        assert!(err.is_creation_error());

        let err = RtosError::post_failed("isr queue full");
        assert!(matches!(err, RtosError::PostFailed(_)));
        assert!(!err.is_creation_error());
    }
}

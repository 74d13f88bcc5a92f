//! Error types for the scheduling bridge.
//!
//! Every bridge entry point returns a [`BridgeResult`]. Callers that speak the
//! VM's integer protocol collapse a result into a [`Status`].

use std::fmt;
use thiserror::Error;
use vmwake_rtos::RtosError;

/// Which bridge primitive an error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// The one-shot wake timer.
    WakeTimer,
    /// The semaphore the VM task idles on.
    WakeSignal,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WakeTimer => write!(f, "wake timer"),
            Self::WakeSignal => write!(f, "wake signal"),
        }
    }
}

/// Which primitive operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Starting the wake timer.
    Arm,
    /// Cancelling the wake timer.
    Stop,
    /// Blocking on the wake signal.
    Wait,
    /// Releasing the wake signal.
    Post,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arm => write!(f, "arm"),
            Self::Stop => write!(f, "stop"),
            Self::Wait => write!(f, "wait"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Coarse classification of bridge failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The environment cannot support the bridge, or the bridge was misused.
    Configuration,
    /// A timer or semaphore could not be created.
    PrimitiveCreation,
    /// A timer or semaphore operation failed at runtime.
    PrimitiveOperation,
}

/// Errors returned by bridge entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Invalid configuration or unusable environment.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Creating a primitive failed.
    #[error("Failed to create {primitive}: {source}")]
    PrimitiveCreation {
        /// Primitive being created.
        primitive: Primitive,
        /// Underlying platform error.
        source: RtosError,
    },

    /// A primitive operation failed.
    #[error("Wake {operation} failed: {source}")]
    PrimitiveOperation {
        /// Operation that failed.
        operation: Operation,
        /// Underlying platform error.
        source: RtosError,
    },

    /// An entry point that needs the primitives ran before `initialize`.
    #[error("Scheduling bridge is not initialized")]
    NotInitialized,

    /// `initialize` ran a second time.
    #[error("Scheduling bridge is already initialized")]
    AlreadyInitialized,

    /// The primitives were released by `shutdown`.
    #[error("Scheduling bridge has been shut down")]
    ShutDown,
}

impl BridgeError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create a primitive creation error.
    #[must_use]
    pub fn creation(primitive: Primitive, source: RtosError) -> Self {
        Self::PrimitiveCreation { primitive, source }
    }

    /// Create a primitive operation error.
    #[must_use]
    pub fn operation(operation: Operation, source: RtosError) -> Self {
        Self::PrimitiveOperation { operation, source }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::ShutDown => ErrorKind::Configuration,
            Self::PrimitiveCreation { .. } => ErrorKind::PrimitiveCreation,
            Self::PrimitiveOperation { .. } => ErrorKind::PrimitiveOperation,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Integer status reported to the VM scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// The operation succeeded.
    Ok = 0,
    /// The operation failed.
    Error = -1,
}

impl Status {
    /// Numeric code handed to the VM.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Whether this is [`Status::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl<T> From<&BridgeResult<T>> for Status {
    fn from(result: &BridgeResult<T>) -> Self {
        if result.is_ok() { Self::Ok } else { Self::Error }
    }
}

impl<T> From<BridgeResult<T>> for Status {
    fn from(result: BridgeResult<T>) -> Self {
        Self::from(&result)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

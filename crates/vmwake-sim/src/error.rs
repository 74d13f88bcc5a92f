//! Error types for vmwake-sim

use thiserror::Error;
use vmwake_bridge::BridgeError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("RTOS error: {0}")]
    Rtos(#[from] vmwake_rtos::RtosError),

    #[error("External event thread panicked")]
    EventThreadPanicked,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SimError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfiguration(_) | Self::JsonError(_) => 4,
            Self::Bridge(e) => match e.kind() {
                vmwake_bridge::ErrorKind::Configuration => 4,
                vmwake_bridge::ErrorKind::PrimitiveCreation => 5,
                vmwake_bridge::ErrorKind::PrimitiveOperation => 6,
            },
            Self::Rtos(_) => 5,
            Self::EventThreadPanicked | Self::IoError(_) => 1,
        }
    }
}

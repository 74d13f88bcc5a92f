//! Simulation configuration, loaded from JSON and overridden by flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use vmwake_bridge::BridgeConfig;

use crate::error::SimError;

/// Everything a simulation run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Timer service tick rate of the simulated RTOS.
    pub tick_rate_hz: u32,
    /// Sleep durations of the simulated VM threads, relative to start.
    pub delays_ms: Vec<i64>,
    /// Period of the external event source, if any.
    pub external_wake_interval_ms: Option<u64>,
    /// Number of external events to raise.
    pub external_wakes: u32,
    /// Bridge settings.
    pub bridge: BridgeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 1000,
            delays_ms: vec![50, 10, 30, 30, 75],
            external_wake_interval_ms: None,
            external_wakes: 0,
            bridge: BridgeConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.delays_ms.is_empty() {
            return Err(SimError::InvalidConfiguration(
                "at least one delay is required".to_string(),
            ));
        }
        if self.delays_ms.iter().any(|d| *d < 0) {
            return Err(SimError::InvalidConfiguration(
                "delays must not be negative".to_string(),
            ));
        }
        if self.external_wakes > 0 && self.external_wake_interval_ms.is_none() {
            return Err(SimError::InvalidConfiguration(
                "external_wakes requires external_wake_interval_ms".to_string(),
            ));
        }
        self.bridge.validate()?;
        Ok(())
    }
}

//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// What `shutdown` does with the wake timer and wake signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Leave the primitives in place; `shutdown` only logs.
    #[default]
    Retain,
    /// Stop the timer and drop both primitives. Later calls report `ShutDown`.
    Release,
}

/// Configuration for [`SchedulingBridge`](crate::SchedulingBridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Placeholder countdown given to the wake timer at creation (milliseconds).
    ///
    /// The timer is always re-armed with the real delay before it starts; some
    /// platforms reject a zero countdown at creation time.
    pub initial_timer_delay_ms: i64,
    /// Notify the scheduler when an expiry arrives for a superseded arm.
    ///
    /// A stale expiry is redundant: the VM re-evaluates its queue and issues a
    /// fresh schedule request. Disabling this drops such notifications.
    pub notify_on_stale_fire: bool,
    /// Behaviour of `shutdown`.
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_timer_delay_ms: 100,
            notify_on_stale_fire: true,
            shutdown_policy: ShutdownPolicy::Retain,
        }
    }
}

impl BridgeConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.initial_timer_delay_ms <= 0 {
            return Err(BridgeError::configuration(
                "initial_timer_delay_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Set the placeholder countdown in milliseconds.
    #[must_use]
    pub fn initial_timer_delay_ms(mut self, ms: i64) -> Self {
        self.config.initial_timer_delay_ms = ms;
        self
    }

    /// Choose whether stale expiries still notify the scheduler.
    #[must_use]
    pub fn notify_on_stale_fire(mut self, enabled: bool) -> Self {
        self.config.notify_on_stale_fire = enabled;
        self
    }

    /// Set the shutdown policy.
    #[must_use]
    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown_policy = policy;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> BridgeResult<BridgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.initial_timer_delay_ms, 100);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Retain);
    }

    #[test]
    fn test_builder_rejects_zero_delay() {
        let result = BridgeConfig::builder().initial_timer_delay_ms(0).build();
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_builder_sets_fields() -> BridgeResult<()> {
        let config = BridgeConfig::builder()
            .initial_timer_delay_ms(5)
            .notify_on_stale_fire(false)
            .shutdown_policy(ShutdownPolicy::Release)
            .build()?;
        assert_eq!(config.initial_timer_delay_ms, 5);
        assert!(!config.notify_on_stale_fire);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Release);
        Ok(())
    }
}

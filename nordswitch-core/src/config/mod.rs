//! Configuration module
//!
//! Optional TOML configuration for the automation toolkit: a custom
//! executable path plus tuning knobs for state polling and GUI readiness
//! detection. Everything has a sensible default; a missing config file is
//! not an error.

use crate::vpn::poll::ReadinessOptions;
use crate::vpn::PollSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod toml_config;

/// Toolkit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Custom path to the NordVPN executable
    #[serde(default)]
    pub exe_path: Option<String>,

    /// Deadline for connect/disconnect state polling, in seconds
    #[serde(default = "default_state_timeout_secs")]
    pub state_timeout_secs: u64,

    /// Spacing between state probes, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Override for the public-IP insights endpoint
    #[serde(default)]
    pub insights_endpoint: Option<String>,

    /// GUI readiness detection tuning
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Tuning for the desktop client's steady-state detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Minimum resident memory (MB) before the app counts as started
    #[serde(default = "default_threshold_mb")]
    pub threshold_mb: f64,

    /// Number of trailing memory samples that must agree
    #[serde(default = "default_window")]
    pub window: usize,

    /// Maximum allowed deviation from the window mean, in percent
    #[serde(default = "default_variance_pct")]
    pub variance_pct: f64,

    /// Overall readiness deadline, in seconds
    #[serde(default = "default_readiness_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_state_timeout_secs() -> u64 {
    45
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_threshold_mb() -> f64 {
    200.0
}

fn default_window() -> usize {
    6
}

fn default_variance_pct() -> f64 {
    1.0
}

fn default_readiness_timeout_secs() -> u64 {
    60
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            exe_path: None,
            state_timeout_secs: default_state_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            insights_endpoint: None,
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            threshold_mb: default_threshold_mb(),
            window: default_window(),
            variance_pct: default_variance_pct(),
            timeout_secs: default_readiness_timeout_secs(),
        }
    }
}

impl SwitchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.state_timeout_secs == 0 {
            return Err("state_timeout_secs cannot be zero".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms cannot be zero".to_string());
        }
        if self.readiness.window < 2 {
            return Err("readiness.window must be at least 2".to_string());
        }
        if self.readiness.variance_pct <= 0.0 {
            return Err("readiness.variance_pct must be positive".to_string());
        }
        if self.readiness.timeout_secs == 0 {
            return Err("readiness.timeout_secs cannot be zero".to_string());
        }
        Ok(())
    }

    /// Polling cadence for state transitions
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.state_timeout_secs),
        }
    }

    /// Readiness detection options for the desktop client
    pub fn readiness_options(&self) -> ReadinessOptions {
        ReadinessOptions {
            threshold_mb: self.readiness.threshold_mb,
            window: self.readiness.window,
            variance_pct: self.readiness.variance_pct,
            timeout: Duration::from_secs(self.readiness.timeout_secs),
            ..ReadinessOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SwitchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_settings().interval, Duration::from_secs(1));
        assert_eq!(config.poll_settings().timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = SwitchConfig {
            state_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.state_timeout_secs = 45;
        config.readiness.window = 1;
        assert!(config.validate().is_err());
    }
}

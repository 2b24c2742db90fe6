//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between ticks in milliseconds
    #[serde(rename = "interval-ms", default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Pause after a failed tick in milliseconds
    #[serde(rename = "error-pause-ms", default = "default_error_pause_ms")]
    pub error_pause_ms: u64,

    /// Per-request timeout for deliveries in milliseconds
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_error_pause_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            error_pause_ms: default_error_pause_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.error_pause(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("interval-ms: 500").unwrap();
        assert_eq!(config.interval_ms, 500);
        assert_eq!(config.error_pause_ms, 1_000);
        assert_eq!(config.request_timeout_ms, 10_000);
    }
}

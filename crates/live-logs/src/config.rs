//! Live log view configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LiveLogsError, Result};
use crate::row::TimeMode;

/// Configuration for a live log session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveLogsConfig {
    /// Quiet period before buffered growth is recomputed.
    #[serde(rename = "batch_interval_ms", with = "duration_ms")]
    pub batch_interval: Duration,
    /// Longest a pending recompute may be deferred under continuous arrivals.
    #[serde(rename = "max_batch_wait_ms", with = "duration_ms")]
    pub max_batch_wait: Duration,
    /// Whether the infra channel may subscribe at all.
    pub infra_logs_enabled: bool,
    /// Initial infra visibility.
    pub show_infra: bool,
    /// Initial "show previous" setting.
    pub show_previous: bool,
    /// Time zone used for row timestamps.
    pub time_mode: TimeMode,
    /// Capacity of the driver's command channel.
    pub command_buffer: usize,
}

impl Default for LiveLogsConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_millis(400),
            max_batch_wait: Duration::from_secs(2),
            infra_logs_enabled: true,
            show_infra: true,
            show_previous: false,
            time_mode: TimeMode::Local,
            command_buffer: 64,
        }
    }
}

impl LiveLogsConfig {
    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch interval is zero, the maximum wait is
    /// shorter than the interval, or the command buffer is empty.
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval.is_zero() {
            return Err(LiveLogsError::InvalidConfig(
                "batch interval must be positive".to_string(),
            ));
        }
        if self.max_batch_wait < self.batch_interval {
            return Err(LiveLogsError::InvalidConfig(format!(
                "max batch wait ({}ms) is shorter than the batch interval ({}ms)",
                self.max_batch_wait.as_millis(),
                self.batch_interval.as_millis()
            )));
        }
        if self.command_buffer == 0 {
            return Err(LiveLogsError::InvalidConfig(
                "command buffer must hold at least one command".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the batch interval.
    #[must_use]
    pub const fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Set the maximum batch wait.
    #[must_use]
    pub const fn with_max_batch_wait(mut self, max_wait: Duration) -> Self {
        self.max_batch_wait = max_wait;
        self
    }

    /// Enable or disable the infra channel.
    #[must_use]
    pub const fn with_infra_logs_enabled(mut self, enabled: bool) -> Self {
        self.infra_logs_enabled = enabled;
        self
    }

    /// Set initial infra visibility.
    #[must_use]
    pub const fn with_show_infra(mut self, show: bool) -> Self {
        self.show_infra = show;
        self
    }

    /// Set the initial "show previous" setting.
    #[must_use]
    pub const fn with_show_previous(mut self, show: bool) -> Self {
        self.show_previous = show;
        self
    }

    /// Set the time mode.
    #[must_use]
    pub const fn with_time_mode(mut self, mode: TimeMode) -> Self {
        self.time_mode = mode;
        self
    }

    /// Set the command channel capacity.
    #[must_use]
    pub const fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LiveLogsConfig::default();

        assert_eq!(config.batch_interval, Duration::from_millis(400));
        assert_eq!(config.max_batch_wait, Duration::from_secs(2));
        assert!(config.infra_logs_enabled);
        assert!(config.show_infra);
        assert!(!config.show_previous);
        assert_eq!(config.time_mode, TimeMode::Local);
        assert_eq!(config.command_buffer, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LiveLogsConfig::default()
            .with_batch_interval(Duration::from_millis(100))
            .with_max_batch_wait(Duration::from_millis(500))
            .with_infra_logs_enabled(false)
            .with_show_infra(false)
            .with_show_previous(true)
            .with_time_mode(TimeMode::Utc)
            .with_command_buffer(8);

        assert_eq!(config.batch_interval, Duration::from_millis(100));
        assert_eq!(config.max_batch_wait, Duration::from_millis(500));
        assert!(!config.infra_logs_enabled);
        assert!(!config.show_infra);
        assert!(config.show_previous);
        assert_eq!(config.time_mode, TimeMode::Utc);
        assert_eq!(config.command_buffer, 8);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = LiveLogsConfig::default().with_batch_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(LiveLogsError::InvalidConfig(_))));
    }

    #[test]
    fn test_short_max_wait_rejected() {
        let config = LiveLogsConfig::default().with_max_batch_wait(Duration::from_millis(100));
        assert!(matches!(config.validate(), Err(LiveLogsError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_command_buffer_rejected() {
        let config = LiveLogsConfig::default().with_command_buffer(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = LiveLogsConfig::from_json(r#"{"batch_interval_ms": 250, "time_mode": "utc"}"#);
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.batch_interval, Duration::from_millis(250));
            assert_eq!(config.max_batch_wait, Duration::from_secs(2));
            assert_eq!(config.time_mode, TimeMode::Utc);
        }
    }

    #[test]
    fn test_from_json_invalid() {
        let result = LiveLogsConfig::from_json(r#"{"batch_interval_ms": 5000}"#);
        assert!(matches!(result, Err(LiveLogsError::InvalidConfig(_))));

        let result = LiveLogsConfig::from_json("not json");
        assert!(matches!(result, Err(LiveLogsError::Decode(_))));
    }

    #[test]
    fn test_json_roundtrip_uses_millis() {
        let json = serde_json::to_value(LiveLogsConfig::default()).map_err(|e| e.to_string());
        assert!(json.is_ok());

        if let Ok(json) = json {
            assert_eq!(json["batch_interval_ms"], 400);
            assert_eq!(json["max_batch_wait_ms"], 2000);
        }
    }
}

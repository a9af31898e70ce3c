//! Scheduler settings resolved from the shared `Settings`.

use std::time::Duration;

use chrono_tz::Tz;

use cron_types::Settings;

use crate::SchedulerError;

/// Resolved scheduler settings: cron timezone and shutdown grace period.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Timezone every cron expression is evaluated in
    pub timezone: Tz,
    /// How long `shutdown` waits for running job bodies
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl TryFrom<&Settings> for SchedulerConfig {
    type Error = SchedulerError;

    /// Fails with `InvalidTimezone` when `default_timezone` is not an IANA name.
    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        let timezone = settings
            .default_timezone
            .parse::<Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(settings.default_timezone.clone()))?;

        Ok(Self {
            timezone,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings_defaults() {
        let config = SchedulerConfig::try_from(&Settings::default()).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            default_timezone: "Europe/Warsaw".to_string(),
            shutdown_timeout_secs: 5,
            ..Default::default()
        };
        let config = SchedulerConfig::try_from(&settings).unwrap();
        assert_eq!(config.timezone, Tz::Europe__Warsaw);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let settings = Settings {
            default_timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        match SchedulerConfig::try_from(&settings) {
            Err(SchedulerError::InvalidTimezone(tz)) => assert_eq!(tz, "Mars/Olympus"),
            other => panic!("expected InvalidTimezone, got {:?}", other),
        }
    }

    #[test]
    fn test_builders() {
        let config = SchedulerConfig::default()
            .with_timezone(Tz::Asia__Tokyo)
            .with_shutdown_timeout(Duration::from_millis(250));
        assert_eq!(config.timezone, Tz::Asia__Tokyo);
        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
    }
}

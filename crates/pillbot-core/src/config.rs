//! Application configuration management.
//!
//! Handles loading, saving, and validating the pillbot server configuration:
//! - Bind address for the HTTP server
//! - Data directory for the JSON store
//! - Timezone that defines calendar-day boundaries for schedules and streaks
//! - Forward schedule window, session TTL, and low-stock threshold
//!
//! Policy constants of the dose state machine (on-time window, snooze
//! escalation) are deliberately NOT configuration; see [`crate::dose`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_address: SocketAddr,

    /// Directory the JSON store writes to.
    pub data_dir: PathBuf,

    /// Timezone used for calendar-day boundaries (schedule expansion,
    /// daily breakdowns, streaks).
    #[serde(with = "timezone_serde")]
    pub timezone: Tz,

    /// How many days ahead the schedule generator expands.
    pub schedule_window_days: u32,

    /// Bearer session lifetime in hours.
    pub session_ttl_hours: u32,

    /// Default `remaining` threshold for low-stock alerts.
    pub low_stock_threshold: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: default_data_dir(),
            timezone: chrono_tz::UTC,
            schedule_window_days: 7,
            session_ttl_hours: 720,
            low_stock_threshold: 7,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, or return defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the config file path: `PILLBOT_CONFIG` env var when set,
    /// platform default otherwise.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("PILLBOT_CONFIG") {
            return PathBuf::from(path);
        }
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/pillbot/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "pillbot")
                .map(|dirs| dirs.config_dir().join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("./pillbot.toml"))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.schedule_window_days == 0 {
            return Err(CoreError::ConfigValidationError(
                "schedule_window_days must be at least 1".into(),
            ));
        }
        if self.session_ttl_hours == 0 {
            return Err(CoreError::ConfigValidationError(
                "session_ttl_hours must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Default data directory.
///
/// On a deployed Linux box: `/var/lib/pillbot/`.
/// For development elsewhere: the per-user data dir.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/pillbot")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "pillbot")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"))
    }
}

mod timezone_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule_window_days, 7);
        assert_eq!(config.low_stock_threshold, 7);
        assert_eq!(config.timezone, chrono_tz::UTC);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ServerConfig::default();
        config.timezone = chrono_tz::Asia::Dhaka;
        config.schedule_window_days = 14;
        config.save(&path).unwrap();

        let loaded = ServerConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.timezone, chrono_tz::Asia::Dhaka);
        assert_eq!(loaded.schedule_window_days, 14);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ServerConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(loaded.session_ttl_hours, 720);
    }

    #[test]
    fn test_zero_window_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "schedule_window_days = 0\n").unwrap();
        let err = ServerConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigValidationError(_)));
    }

    #[test]
    fn test_bad_timezone_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"Mars/Olympus\"\n").unwrap();
        assert!(ServerConfig::load_or_default(&path).is_err());
    }
}

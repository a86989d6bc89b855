//! # Sync Configuration
//!
//! `SyncConfig` describes where the posture server lives and how the
//! supervisor retries. It loads from TOML, then environment variables
//! override individual fields:
//!
//! ```toml
//! base_url = "http://127.0.0.1:8080"
//! compliance_path = "/api/compliance/stream"
//! fleet_path = "/api/fleet/events"
//! retry_delay_secs = 5
//! connect_timeout_secs = 10
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `POSTURE_BASE_URL` | `base_url` |
//! | `POSTURE_RETRY_DELAY_SECS` | `retry_delay_secs` |

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Delay between a connection failure and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Environment variable overriding `base_url`.
pub const ENV_BASE_URL: &str = "POSTURE_BASE_URL";

/// Environment variable overriding `retry_delay_secs`.
pub const ENV_RETRY_DELAY_SECS: &str = "POSTURE_RETRY_DELAY_SECS";

/// Settings for one stream instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Absolute stream URL
    pub url: String,
    /// Fixed delay before each reconnection attempt
    pub retry_delay: Duration,
}

impl StreamConfig {
    /// Stream at `url` with the default retry delay.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the retry delay.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Connection settings for the posture server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Server origin, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Path of the compliance stream
    pub compliance_path: String,
    /// Path of the fleet event stream
    pub fleet_path: String,
    /// Seconds between a failure and the next attempt
    pub retry_delay_secs: u64,
    /// Seconds allowed for the TCP/TLS connect phase
    pub connect_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            compliance_path: "/api/compliance/stream".to_string(),
            fleet_path: "/api/fleet/events".to_string(),
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            connect_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file. Missing fields keep their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit set of variables.
    pub fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            match key.as_str() {
                ENV_BASE_URL => self.base_url = value,
                ENV_RETRY_DELAY_SECS => {
                    self.retry_delay_secs = value.trim().parse().map_err(|_| {
                        ConfigError::invalid("retry_delay_secs", format!("`{value}` is not a number"))
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "base_url",
                format!("unsupported scheme `{}`", base.scheme()),
            ));
        }
        for (field, path) in [
            ("compliance_path", &self.compliance_path),
            ("fleet_path", &self.fleet_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(field, "path must start with `/`"));
            }
        }
        if self.retry_delay_secs == 0 {
            return Err(ConfigError::invalid("retry_delay_secs", "must be positive"));
        }
        Ok(())
    }

    /// Retry delay as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Stream settings for the compliance instance.
    pub fn compliance_stream(&self) -> StreamConfig {
        self.stream_for(&self.compliance_path)
    }

    /// Stream settings for the fleet instance.
    pub fn fleet_stream(&self) -> StreamConfig {
        self.stream_for(&self.fleet_path)
    }

    fn stream_for(&self, path: &str) -> StreamConfig {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        StreamConfig::new(url).with_retry_delay(self.retry_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_delay(), DEFAULT_RETRY_DELAY);
        assert_eq!(
            config.compliance_stream().url,
            "http://127.0.0.1:8080/api/compliance/stream"
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posture.toml");
        fs::write(&path, "base_url = \"https://posture.internal/\"\nretry_delay_secs = 2\n").unwrap();

        let config = SyncConfig::load_from_file(&path).unwrap();
        assert_eq!(config.retry_delay_secs, 2);
        assert_eq!(config.fleet_path, "/api/fleet/events");
        assert_eq!(config.fleet_stream().url, "https://posture.internal/api/fleet/events");
        assert_eq!(config.fleet_stream().retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = SyncConfig::default();
        config
            .merge_with_vars([
                (ENV_BASE_URL.to_string(), "http://10.0.0.5:9000".to_string()),
                (ENV_RETRY_DELAY_SECS.to_string(), "7".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.retry_delay_secs, 7);

        let err = config
            .merge_with_vars([(ENV_RETRY_DELAY_SECS.to_string(), "soon".to_string())])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "retry_delay_secs", .. }));
    }

    #[test]
    fn validation_rejects_bad_fields() {
        let mut config = SyncConfig {
            base_url: "ftp://host".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.base_url = "http://host".to_string();
        config.fleet_path = "fleet".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "fleet_path", .. })
        ));

        config.fleet_path = "/fleet".to_string();
        config.retry_delay_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unreadable_file_is_reported() {
        let err = SyncConfig::load_from_file(Path::new("/nonexistent/posture.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

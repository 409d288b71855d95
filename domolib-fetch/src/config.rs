//! Pipeline configuration.
//!
//! Stored as JSON. A missing file means defaults; a present but malformed
//! file is an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use domolib_core::LogLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::executor::RequestExecutor;
use crate::logging::TracingSink;
use crate::retry::{Backoff, RetryPolicy};
use crate::session::{DEFAULT_TIMEOUT_SECS, SessionSettings, USER_AGENT};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Hosts requests may target; absent means any.
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Default fan-out concurrency.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Ambient log threshold for calls without an override.
    #[serde(default)]
    pub default_log_level: LogLevel,
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Delay growth.
    #[serde(default)]
    pub backoff: Backoff,
    /// Random extra delay.
    #[serde(default)]
    pub jitter: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_max_concurrency() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: Backoff::default(),
            jitter: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            allowed_domains: None,
            retry: RetrySettings::default(),
            max_concurrency: default_max_concurrency(),
            default_log_level: LogLevel::default(),
        }
    }
}

impl PipelineConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("domolib")
            .join("config.json")
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`PipelineConfig::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms exceeds retry.max_delay_ms".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Settings for sessions built from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            allowed_domains: self.allowed_domains.clone(),
        }
    }

    /// Retry policy from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_backoff(self.retry.backoff)
            .with_jitter(self.retry.jitter)
    }

    /// Executor logging through `tracing` at the configured threshold.
    pub fn executor(&self) -> RequestExecutor {
        RequestExecutor::with_sink(Arc::new(TracingSink::new(self.default_log_level)))
            .with_session_settings(self.session_settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"retry": {"max_attempts": 5, "backoff": "fixed"}, "default_log_level": "debug"}"#,
        )
        .unwrap();

        let config = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff, Backoff::Fixed);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.default_log_level, LogLevel::Debug);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = PipelineConfig {
            allowed_domains: Some(vec!["domo.com".to_string()]),
            max_concurrency: 4,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(PipelineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_concurrency": 0}"#).unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&path),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn test_session_settings() {
        let config = PipelineConfig {
            timeout_secs: 5,
            ..Default::default()
        };
        let settings = config.session_settings();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(settings.allowed_domains.is_none());
    }
}

//! Monitor client configuration.
//!
//! Configuration is loaded from environment variables. Durations are given in
//! milliseconds.

use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default wait for a tracked camera to be sighted.
pub const DEFAULT_FIRST_SIGHT_TIMEOUT_MS: u64 = 10_000;

/// Default wait before a departure is confirmed.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Initial signaling reconnect backoff.
pub const DEFAULT_RECONNECT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Default cap on the signaling reconnect backoff.
pub const DEFAULT_RECONNECT_MAX_BACKOFF_MS: u64 = 30_000;

/// Monitor client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend REST base URL.
    pub api_url: String,

    /// Signaling WebSocket URL.
    pub signaling_url: String,

    /// Media server URL handed to the media connector. Only hosts that open
    /// media sessions need it.
    pub media_url: Option<String>,

    /// Presence timing for tracked cameras.
    pub presence: PresenceTiming,

    /// HTTP request timeout (default: 10s).
    pub http_timeout: Duration,

    /// Signaling reconnect policy (1s doubling, capped at 30s by default).
    pub reconnect: ReconnectPolicy,

    /// Log filter and format.
    pub observability: ObservabilityConfig,
}

/// Timers of the room membership coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTiming {
    /// How long a tracked camera may stay unseen after attach.
    pub first_sight_timeout: Duration,
    /// How long a departed camera may stay away before it counts as offline.
    pub settle_delay: Duration,
}

impl Default for PresenceTiming {
    fn default() -> Self {
        Self {
            first_sight_timeout: Duration::from_millis(DEFAULT_FIRST_SIGHT_TIMEOUT_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

/// Exponential reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_RECONNECT_MAX_BACKOFF_MS),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff following `current`.
    #[must_use]
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_url = required_url(vars, "MONITOR_API_URL", &["http://", "https://"])?;
        let signaling_url = required_url(vars, "MONITOR_SIGNALING_URL", &["ws://", "wss://"])?;
        let media_url = optional_url(vars, "MONITOR_MEDIA_URL", &["ws://", "wss://", "http://", "https://"])?;

        let first_sight_timeout = millis(
            vars,
            "MONITOR_FIRST_SIGHT_TIMEOUT_MS",
            DEFAULT_FIRST_SIGHT_TIMEOUT_MS,
        )?;
        let settle_delay = millis(vars, "MONITOR_SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY_MS)?;
        let http_timeout = millis(vars, "MONITOR_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;
        let max_backoff = millis(
            vars,
            "MONITOR_RECONNECT_MAX_BACKOFF_MS",
            DEFAULT_RECONNECT_MAX_BACKOFF_MS,
        )?;

        let initial_backoff = Duration::from_millis(DEFAULT_RECONNECT_INITIAL_BACKOFF_MS);
        if max_backoff < initial_backoff {
            return Err(ConfigError::InvalidValue(format!(
                "MONITOR_RECONNECT_MAX_BACKOFF_MS must be at least {DEFAULT_RECONNECT_INITIAL_BACKOFF_MS}"
            )));
        }

        Ok(Config {
            api_url,
            signaling_url,
            media_url,
            presence: PresenceTiming {
                first_sight_timeout,
                settle_delay,
            },
            http_timeout,
            reconnect: ReconnectPolicy {
                initial_backoff,
                max_backoff,
            },
            observability: ObservabilityConfig::from_vars(vars),
        })
    }
}

impl Config {
    /// Media server URL, for hosts that open media sessions.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingEnvVar` if `MONITOR_MEDIA_URL` was not set.
    pub fn require_media_url(&self) -> Result<&str, ConfigError> {
        self.media_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("MONITOR_MEDIA_URL".to_string()))
    }
}

fn required_url(
    vars: &HashMap<String, String>,
    name: &str,
    schemes: &[&str],
) -> Result<String, ConfigError> {
    optional_url(vars, name, schemes)?.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_url(
    vars: &HashMap<String, String>,
    name: &str,
    schemes: &[&str],
) -> Result<Option<String>, ConfigError> {
    let Some(value) = vars
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };

    if !schemes.iter().any(|scheme| value.starts_with(scheme)) {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must start with one of {}",
            schemes.join(", ")
        )));
    }

    Ok(Some(value))
}

fn millis(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<Duration, ConfigError> {
    let ms = match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(format!("{name}: {e}")))?,
        None => default,
    };

    if ms == 0 {
        return Err(ConfigError::InvalidValue(format!("{name} must be positive")));
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "MONITOR_API_URL".to_string(),
                "https://api.example.com".to_string(),
            ),
            (
                "MONITOR_SIGNALING_URL".to_string(),
                "wss://signal.example.com".to_string(),
            ),
            (
                "MONITOR_MEDIA_URL".to_string(),
                "wss://media.example.com".to_string(),
            ),
        ])
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.presence.first_sight_timeout, Duration::from_secs(10));
        assert_eq!(config.presence.settle_delay, Duration::from_millis(500));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(30));
        assert!(!config.observability.json_logs);
    }

    #[test]
    fn test_config_overrides() {
        let mut vars = base_vars();
        vars.insert("MONITOR_FIRST_SIGHT_TIMEOUT_MS".to_string(), "2500".to_string());
        vars.insert("MONITOR_SETTLE_DELAY_MS".to_string(), "250".to_string());
        vars.insert("MONITOR_RECONNECT_MAX_BACKOFF_MS".to_string(), "8000".to_string());
        vars.insert("MONITOR_LOG_JSON".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.presence.first_sight_timeout, Duration::from_millis(2500));
        assert_eq!(config.presence.settle_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(8));
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_missing_required_var() {
        let mut vars = base_vars();
        vars.remove("MONITOR_SIGNALING_URL");

        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "MONITOR_SIGNALING_URL"));
    }

    #[test]
    fn test_media_url_is_optional() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.require_media_url().unwrap(), "wss://media.example.com");

        let mut vars = base_vars();
        vars.remove("MONITOR_MEDIA_URL");
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.media_url, None);
        assert!(matches!(
            config.require_media_url(),
            Err(ConfigError::MissingEnvVar(name)) if name == "MONITOR_MEDIA_URL"
        ));

        vars.insert("MONITOR_MEDIA_URL".to_string(), "ftp://media".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "MONITOR_SIGNALING_URL".to_string(),
            "https://signal.example.com".to_string(),
        );

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_invalid_durations_rejected() {
        let mut vars = base_vars();
        vars.insert("MONITOR_SETTLE_DELAY_MS".to_string(), "soon".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut vars = base_vars();
        vars.insert("MONITOR_FIRST_SIGHT_TIMEOUT_MS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut vars = base_vars();
        vars.insert("MONITOR_RECONNECT_MAX_BACKOFF_MS".to_string(), "500".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let policy = ReconnectPolicy::default();
        let mut backoff = policy.initial_backoff;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(backoff.as_secs());
            backoff = policy.next(backoff);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30]);
    }
}

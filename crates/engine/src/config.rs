//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Configuration errors surfaced at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `var`, falling back to `default` when unset, and parse it.
pub fn env_or<T>(var: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.clone(),
        reason: e.to_string(),
    })
}

/// Positive number of seconds from `var`.
fn env_secs(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = env_or(var, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: "0".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Timing of the debounced canvas autosave.
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last change before saving.
    pub debounce: Duration,
    /// Minimum spacing between two saves.
    pub min_interval: Duration,
    /// Save at least this often while there are unsaved changes.
    pub periodic: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            min_interval: Duration::from_secs(3),
            periodic: Duration::from_secs(30),
        }
    }
}

/// Settings of the generation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HTTP base URL of the generation backend.
    pub backend_url: String,
    /// WebSocket base URL of the job feed.
    pub feed_url: String,
    /// Interval of the status poll while a node is generating.
    pub poll_interval: Duration,
    /// Deadline for the backend to acknowledge a submission. Kept below
    /// the HTTP request timeout.
    pub submit_timeout: Duration,
    pub autosave: AutosaveConfig,
    /// Open sessions with no viewers and no edits for this long are closed.
    pub session_idle: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".into(),
            feed_url: "ws://localhost:8000".into(),
            poll_interval: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(20),
            autosave: AutosaveConfig::default(),
            session_idle: Duration::from_secs(600),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `BACKEND_URL`            | `http://localhost:8000` |
    /// | `FEED_URL`               | `ws://localhost:8000`   |
    /// | `POLL_INTERVAL_SECS`     | `5`                     |
    /// | `SUBMIT_TIMEOUT_SECS`    | `20`                    |
    /// | `SESSION_IDLE_SECS`      | `600`                   |
    /// | `SAVE_DEBOUNCE_SECS`     | `5`                     |
    /// | `MIN_SAVE_INTERVAL_SECS` | `3`                     |
    /// | `PERIODIC_SAVE_SECS`     | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url = std::env::var("BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into());
        let feed_url = std::env::var("FEED_URL").unwrap_or_else(|_| "ws://localhost:8000".into());

        Ok(Self {
            backend_url,
            feed_url,
            poll_interval: env_secs("POLL_INTERVAL_SECS", 5)?,
            submit_timeout: env_secs("SUBMIT_TIMEOUT_SECS", 20)?,
            autosave: AutosaveConfig {
                debounce: env_secs("SAVE_DEBOUNCE_SECS", 5)?,
                min_interval: env_secs("MIN_SAVE_INTERVAL_SECS", 3)?,
                periodic: env_secs("PERIODIC_SAVE_SECS", 30)?,
            },
            session_idle: env_secs("SESSION_IDLE_SECS", 600)?,
        })
    }
}

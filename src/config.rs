//! Configuration management for the director task engine.
//!
//! Configuration can be set via environment variables:
//! - `DIRECTOR_URL` - Required. Base URL of the director API.
//! - `DIRECTOR_USERNAME` - Optional. Basic auth user for the director.
//! - `DIRECTOR_PASSWORD` - Optional. Basic auth password for the director.
//! - `DIRECTOR_RECENT_TASKS_LIMIT` - Optional. How many recent tasks to list. Defaults to `30`.
//! - `DIRECTOR_TASK_POLL_INTERVAL_MS` - Optional. Task state poll interval. Defaults to `1000`.
//! - `DIRECTOR_ERRAND_EXIT_CODE_CORRECTION` - Optional. Reinterpret `done` errand
//!   tasks with a non-zero exit code as `error`. Defaults to `true`.

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::util::env_var_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the director's basic auth.
#[derive(Debug, Clone)]
pub struct DirectorCredentials {
    pub username: String,
    pub password: String,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Director API base URL
    pub director_url: Url,

    /// Basic auth credentials, if the director requires them
    pub credentials: Option<DirectorCredentials>,

    /// Page size for recent task listings
    pub recent_tasks_limit: usize,

    /// How often a running director task is polled for its state
    pub task_poll_interval: Duration,

    /// Errand exit-code correction toggle
    pub errand_exit_code_correction: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `DIRECTOR_URL` is not set, and
    /// `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("DIRECTOR_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DIRECTOR_URL".to_string()))?;
        let director_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidValue("DIRECTOR_URL".to_string(), e.to_string()))?;

        let credentials = match (
            std::env::var("DIRECTOR_USERNAME").ok(),
            std::env::var("DIRECTOR_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(DirectorCredentials { username, password }),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("DIRECTOR_PASSWORD".to_string()))
            }
            _ => None,
        };

        let recent_tasks_limit = std::env::var("DIRECTOR_RECENT_TASKS_LIMIT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("DIRECTOR_RECENT_TASKS_LIMIT".to_string(), format!("{}", e))
            })?;

        let poll_ms: u64 = std::env::var("DIRECTOR_TASK_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue(
                    "DIRECTOR_TASK_POLL_INTERVAL_MS".to_string(),
                    format!("{}", e),
                )
            })?;

        Ok(Self {
            director_url,
            credentials,
            recent_tasks_limit,
            task_poll_interval: Duration::from_millis(poll_ms),
            errand_exit_code_correction: env_var_bool("DIRECTOR_ERRAND_EXIT_CODE_CORRECTION", true),
        })
    }

    /// Create a config with default values for the given director (useful for testing).
    pub fn new(director_url: Url) -> Self {
        Self {
            director_url,
            credentials: None,
            recent_tasks_limit: 30,
            task_poll_interval: Duration::from_secs(1),
            errand_exit_code_correction: true,
        }
    }
}

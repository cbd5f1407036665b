//! Engine configuration
//!
//! Defines the tunables of a pipeline run: which upstream the pre-flight
//! checks compare against, how events are buffered and how step output is
//! read.

use std::time::Duration;
use thiserror::Error;

/// Default capacity of the per-run event channel
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Default size of a single read from a step's output pipe
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote the checkout must be synchronized with
    pub upstream_remote: String,

    /// Branch on the remote the checkout must be synchronized with
    pub upstream_branch: String,

    /// When set, the checkout must have this branch checked out
    pub require_branch: Option<String>,

    /// Number of events buffered before a slow consumer blocks the run
    pub event_buffer: usize,

    /// Maximum number of bytes taken from a step's output per read
    pub read_chunk_size: usize,

    /// Maximum time a single step may run. `None` waits forever.
    pub step_timeout: Option<Duration>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables:
    /// - DCD_UPSTREAM_REMOTE (default: origin)
    /// - DCD_UPSTREAM_BRANCH (default: main)
    /// - DCD_REQUIRE_BRANCH (optional)
    /// - DCD_EVENT_BUFFER (default: 32)
    /// - DCD_READ_CHUNK_SIZE (bytes, default: 16384)
    /// - DCD_STEP_TIMEOUT (seconds, optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let upstream_remote = lookup("DCD_UPSTREAM_REMOTE").unwrap_or(defaults.upstream_remote);
        let upstream_branch = lookup("DCD_UPSTREAM_BRANCH").unwrap_or(defaults.upstream_branch);
        let require_branch = lookup("DCD_REQUIRE_BRANCH").filter(|b| !b.is_empty());

        let event_buffer = parse_var(&lookup, "DCD_EVENT_BUFFER")?.unwrap_or(defaults.event_buffer);
        let read_chunk_size =
            parse_var(&lookup, "DCD_READ_CHUNK_SIZE")?.unwrap_or(defaults.read_chunk_size);
        let step_timeout = parse_var::<u64, _>(&lookup, "DCD_STEP_TIMEOUT")?.map(Duration::from_secs);

        Ok(Self {
            upstream_remote,
            upstream_branch,
            require_branch,
            event_buffer,
            read_chunk_size,
            step_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_remote.is_empty() {
            return Err(ConfigError::Invalid("upstream_remote cannot be empty".into()));
        }

        if self.upstream_branch.is_empty() {
            return Err(ConfigError::Invalid("upstream_branch cannot be empty".into()));
        }

        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be greater than 0".into()));
        }

        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "read_chunk_size must be greater than 0".into(),
            ));
        }

        if self.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid("step_timeout must be greater than 0".into()));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_remote: "origin".to_string(),
            upstream_branch: "main".to_string(),
            require_branch: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            step_timeout: None,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

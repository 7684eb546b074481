//! Batch engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retries per chunk after the first submission.
pub const DEFAULT_MAX_RETRIES: u32 = 10;
/// Store limit for keys per batch read.
pub const DEFAULT_READ_CHUNK_LIMIT: usize = 100;
/// Store limit for writes per batch write.
pub const DEFAULT_WRITE_CHUNK_LIMIT: usize = 25;

pub const ENV_MAX_RETRIES: &str = "BETTERBATCH_MAX_RETRIES";
pub const ENV_READ_CHUNK_LIMIT: &str = "BETTERBATCH_READ_CHUNK_LIMIT";
pub const ENV_WRITE_CHUNK_LIMIT: &str = "BETTERBATCH_WRITE_CHUNK_LIMIT";

/// Configuration error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: expected an unsigned integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Numeric knobs of the batch engine.
///
/// The backoff policy is not part of this struct because it is code, not data;
/// inject it with `BetterBatch::with_backoff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Resubmissions of a chunk's unprocessed remainder before giving up on it
    /// (0 = submit once, never retry).
    pub max_retries: u32,
    /// Maximum keys per batch-read chunk.
    pub read_chunk_limit: usize,
    /// Maximum writes per batch-write chunk.
    pub write_chunk_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            read_chunk_limit: DEFAULT_READ_CHUNK_LIMIT,
            write_chunk_limit: DEFAULT_WRITE_CHUNK_LIMIT,
        }
    }
}

impl BatchConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_read_chunk_limit(mut self, limit: usize) -> Self {
        self.read_chunk_limit = limit;
        self
    }

    pub fn with_write_chunk_limit(mut self, limit: usize) -> Self {
        self.write_chunk_limit = limit;
        self
    }

    /// Load from `BETTERBATCH_*` environment variables, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (same keys as `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            max_retries: parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(defaults.max_retries),
            read_chunk_limit: parse_var(&lookup, ENV_READ_CHUNK_LIMIT)?
                .unwrap_or(defaults.read_chunk_limit),
            write_chunk_limit: parse_var(&lookup, ENV_WRITE_CHUNK_LIMIT)?
                .unwrap_or(defaults.write_chunk_limit),
        };

        config.validate()?;
        Ok(config)
    }

    /// Chunk limits must be positive; a zero limit can never make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_limit == 0 {
            return Err(ConfigError::ZeroLimit("read_chunk_limit"));
        }
        if self.write_chunk_limit == 0 {
            return Err(ConfigError::ZeroLimit("write_chunk_limit"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}

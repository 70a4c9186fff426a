//! Job configuration.
//!
//! Settings come from an optional TOML file; command-line flags override it.
//!
//! ```toml
//! concurrency = 50
//! timeout_secs = 30
//! endpoint = "https://api.tinypng.com/shrink"
//! extensions = ["png", "jpg"]
//! skip_noise = true
//! noise_patterns = ["__MACOSX", ".svn"]
//! ```

use crate::remote::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Pipelines allowed in flight at once
pub const DEFAULT_CONCURRENCY: usize = 50;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Concurrency ceiling for entry pipelines
    pub concurrency: usize,
    /// Per-request timeout for the remote service
    pub timeout_secs: u64,
    /// Shrink endpoint
    pub endpoint: String,
    /// File extensions sent for compression, without the dot
    pub extensions: Vec<String>,
    /// Pass noise paths through without hashing or compressing them
    pub skip_noise: bool,
    /// Substrings that mark a path as noise
    pub noise_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            extensions: vec!["png".to_string(), "jpg".to_string()],
            skip_noise: true,
            noise_patterns: vec!["__MACOSX".to_string(), ".svn".to_string()],
        }
    }
}

impl Config {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid(
                "extensions must name at least one file type".to_string(),
            ));
        }
        reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint {:?}: {}", self.endpoint, e)))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Lowercased suffixes including the leading dot.
    pub fn suffixes(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{}", e))
            .collect()
    }
}

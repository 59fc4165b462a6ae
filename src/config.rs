//! TOML configuration for the dashboard engine.
//!
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```toml
//! [source]
//! primary = "https://docs.google.com/spreadsheets/d/<id>/export?format=csv"
//! cache_path = "cache/last_good.csv"
//! fallback = ["cache", "sample"]
//! timeout_secs = 30
//!
//! [logging]
//! filter = "info"
//!
//! [export]
//! dir = "out"
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL or local path of the primary dataset.
    pub primary: String,
    /// Where the last good primary fetch is mirrored as CSV.
    pub cache_path: PathBuf,
    /// Steps tried in order after the primary source fails.
    pub fallback: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            primary: "districts_social_data.xlsx".to_string(),
            cache_path: PathBuf::from("cache/last_good.csv"),
            fallback: vec!["cache".to_string(), "sample".to_string()],
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { filter: "info".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig { dir: PathBuf::from("out") }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep {
    Cache,
    Sample,
}

impl FromStr for FallbackStep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache" => Ok(FallbackStep::Cache),
            "sample" => Ok(FallbackStep::Sample),
            other => Err(ConfigError::UnknownFallback(other.to_string())),
        }
    }
}

impl SourceConfig {
    pub fn fallback_steps(&self) -> Result<Vec<FallbackStep>, ConfigError> {
        self.fallback.iter().map(|s| s.parse()).collect()
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(AppConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        // Surface bad fallback names at startup rather than on first failure.
        config.source.fallback_steps()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

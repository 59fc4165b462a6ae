use std::fmt;
use std::io;
use thiserror::Error;

/// Ingestion failed; the whole dataset is unavailable from this source.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("source returned HTTP {status} for {url}")]
    Http { url: String, status: u16 },
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("source file not found: {0}")]
    NotFound(String),
    #[error("unsupported source format: {0} (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),
    #[error("invalid source identifier: {0}")]
    InvalidSource(String),
    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet parse failed: {0}")]
    Excel(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<calamine::Error> for DataSourceError {
    fn from(err: calamine::Error) -> Self {
        DataSourceError::Excel(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("unknown fallback step '{0}' (expected 'cache' or 'sample')")]
    UnknownFallback(String),
}

/// An expected column was absent from a batch; its values read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResolutionWarning {
    pub field: String,
    pub tried: Vec<String>,
}

impl fmt::Display for FieldResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no column for {} (tried: {})", self.field, self.tried.join(", "))
    }
}

//! Source ingestion: one fetch attempt per source, then the configured
//! fallback chain (cached copy, synthetic sample) when the primary fails.

use crate::config::{FallbackStep, SourceConfig};
use crate::error::{ConfigError, DataSourceError};
use crate::normalize::{metric_label, MetricField, DISTRICT_LABEL, MONTH_LABEL, TIMESTAMP_LABEL};
use crate::resolver::REFERENCE_DISTRICTS;
use crate::types::{Platform, RawValue, RawWideRow};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Month, NaiveDate};
use csv::ReaderBuilder;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Rows as delivered, plus the header order so the table can be written back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawWideRow>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Remote(String),
    Local(PathBuf),
}

impl SourceSpec {
    pub fn parse(id: &str) -> Result<Self, DataSourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DataSourceError::InvalidSource("empty source".to_string()));
        }
        let lower = id.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(SourceSpec::Remote(sheet_export_url(id)));
        }
        if id.contains("://") {
            return Err(DataSourceError::InvalidSource(id.to_string()));
        }
        Ok(SourceSpec::Local(PathBuf::from(id)))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Remote(url) => f.write_str(url),
            SourceSpec::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Google Sheets "edit" links are rewritten to their CSV export.
fn sheet_export_url(url: &str) -> String {
    if !url.contains("docs.google.com/spreadsheets/") || url.contains("/export") {
        return url.to_string();
    }
    match url.find("/edit") {
        Some(idx) => format!("{}/export?format=csv", &url[..idx]),
        None => url.to_string(),
    }
}

/// A single fetch attempt; no retries.
pub fn fetch(spec: &SourceSpec, timeout: Duration) -> Result<RawTable, DataSourceError> {
    match spec {
        SourceSpec::Remote(url) => fetch_remote(url, timeout),
        SourceSpec::Local(path) => read_local(path),
    }
}

fn fetch_remote(url: &str, timeout: Duration) -> Result<RawTable, DataSourceError> {
    let network = |e: reqwest::Error| DataSourceError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(network)?;
    let response = client
        .get(url)
        .header("Accept", "text/csv")
        .send()
        .map_err(network)?;
    if !response.status().is_success() {
        return Err(DataSourceError::Http {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let body = response.text().map_err(network)?;
    read_csv(body.as_bytes())
}

pub fn read_local(path: &Path) -> Result<RawTable, DataSourceError> {
    if !path.exists() {
        return Err(DataSourceError::NotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "csv" => read_csv(std::fs::File::open(path)?),
        "xlsx" | "xls" => read_excel(path),
        _ => Err(DataSourceError::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn read_csv<R: Read>(reader: R) -> Result<RawTable, DataSourceError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row = build_row(&headers, record.iter().map(RawValue::from_text));
        if row.values().all(|v| *v == RawValue::Empty) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Pair cells with their headers. A repeated header keeps its first column.
fn build_row<I>(headers: &[String], cells: I) -> RawWideRow
where
    I: IntoIterator<Item = RawValue>,
{
    let mut row = RawWideRow::new();
    for (h, v) in headers.iter().zip(cells) {
        row.entry(h.clone()).or_insert(v);
    }
    row
}

fn read_excel(path: &Path) -> Result<RawTable, DataSourceError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DataSourceError::Excel("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet)?;
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(|c| c.to_string()).collect(),
        None => return Ok(RawTable::default()),
    };
    let mut rows = Vec::new();
    for data_row in rows_iter {
        let row = build_row(&headers, data_row.iter().map(cell_value));
        if row.values().all(|v| *v == RawValue::Empty) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) => RawValue::from_text(s),
        other => RawValue::from_text(&other.to_string()),
    }
}

/// Mirror a table to CSV so it can serve as the cached fallback later.
pub fn write_cache(path: &Path, table: &RawTable) -> Result<(), DataSourceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        let cells: Vec<String> = table
            .headers
            .iter()
            .map(|h| row.get(h).and_then(RawValue::as_text).unwrap_or_default())
            .collect();
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Deterministic stand-in dataset: the first five reference districts, January to
/// June, in the canonical wide layout.
pub fn sample_table() -> RawTable {
    let mut headers = vec![
        TIMESTAMP_LABEL.to_string(),
        DISTRICT_LABEL.to_string(),
        MONTH_LABEL.to_string(),
    ];
    for platform in Platform::ALL {
        for field in MetricField::ALL {
            headers.push(metric_label(platform, field));
        }
    }

    let mut rows = Vec::new();
    for (d_idx, (district, _)) in REFERENCE_DISTRICTS.iter().take(5).enumerate() {
        for m in 1u8..=6 {
            let month = Month::try_from(m).map(|m| m.name()).unwrap_or("Unknown");
            let stamp = NaiveDate::from_ymd_opt(2024, m as u32, 1)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let mut row = RawWideRow::new();
            row.insert(TIMESTAMP_LABEL.to_string(), RawValue::Text(stamp));
            row.insert(DISTRICT_LABEL.to_string(), RawValue::Text(district.to_string()));
            row.insert(MONTH_LABEL.to_string(), RawValue::Text(month.to_string()));
            for (p_idx, platform) in Platform::ALL.into_iter().enumerate() {
                let seed = (d_idx * 7 + m as usize * 3 + p_idx * 5) as u64;
                let posts = 5 + seed % 20;
                let views = posts * (1200 + (seed * 137) % 2600);
                let interactions = views * (2 + seed % 9) / 100;
                let followers = 10 + (seed * 31) % 240;
                for (field, value) in [
                    (MetricField::Posts, posts),
                    (MetricField::Interactions, interactions),
                    (MetricField::Views, views),
                    (MetricField::Followers, followers),
                ] {
                    row.insert(metric_label(platform, field), RawValue::Number(value as f64));
                }
            }
            rows.push(row);
        }
    }
    RawTable { headers, rows }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Primary,
    Cache,
    Sample,
    Empty,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Primary => write!(f, "primary source"),
            Origin::Cache => write!(f, "cached copy"),
            Origin::Sample => write!(f, "sample data"),
            Origin::Empty => write!(f, "empty dataset"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: RawTable,
    pub origin: Origin,
    /// User-facing message, set whenever the primary source failed.
    pub status: Option<String>,
}

/// The one ingestion entry point: primary source, then the fallback chain.
#[derive(Debug, Clone)]
pub struct Ingestor {
    primary: String,
    cache_path: PathBuf,
    steps: Vec<FallbackStep>,
    timeout: Duration,
}

impl Ingestor {
    pub fn from_config(cfg: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Ingestor {
            primary: cfg.primary.clone(),
            cache_path: cfg.cache_path.clone(),
            steps: cfg.fallback_steps()?,
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn load(&self) -> LoadOutcome {
        let err = match SourceSpec::parse(&self.primary).and_then(|s| fetch(&s, self.timeout)) {
            Ok(table) => {
                tracing::info!(source = %self.primary, rows = table.rows.len(), "loaded primary source");
                if let Err(e) = write_cache(&self.cache_path, &table) {
                    tracing::warn!(path = %self.cache_path.display(), error = %e, "could not refresh cache");
                }
                return LoadOutcome { table, origin: Origin::Primary, status: None };
            }
            Err(e) => e,
        };
        tracing::warn!(source = %self.primary, error = %err, "primary source failed");

        for step in &self.steps {
            let attempt = match step {
                FallbackStep::Cache => read_local(&self.cache_path).map(|t| (t, Origin::Cache)),
                FallbackStep::Sample => Ok((sample_table(), Origin::Sample)),
            };
            match attempt {
                Ok((table, origin)) => {
                    tracing::info!(%origin, rows = table.rows.len(), "using fallback");
                    let status = format!(
                        "Could not load data from {}: {}. Showing {}.",
                        self.primary, err, origin
                    );
                    return LoadOutcome { table, origin, status: Some(status) };
                }
                Err(e) => tracing::warn!(?step, error = %e, "fallback step failed"),
            }
        }

        LoadOutcome {
            table: RawTable::default(),
            origin: Origin::Empty,
            status: Some(format!(
                "Could not load data from {}: {}. No data available.",
                self.primary, err
            )),
        }
    }
}

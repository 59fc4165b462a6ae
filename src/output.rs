use crate::controller::{Dataset, DatasetView, Publisher};
use crate::engine::{self, BreakdownRow, EngagementPoint, FootprintPoint};
use crate::types::{
    AggregateResult, DistrictCodeRow, FilterSelection, KpiRow, MetricRecord, PerformanceRow,
};
use crate::util::{format_int, format_number};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn kpi_rows(result: &AggregateResult) -> Vec<KpiRow> {
    vec![KpiRow {
        total_posts: format_int(result.total_posts),
        total_interactions: format_int(result.total_interactions),
        total_views: format_int(result.total_views),
        followers_gained: format_int(result.followers_gained),
    }]
}

pub fn performance_rows(result: &AggregateResult) -> Vec<PerformanceRow> {
    result
        .platforms
        .iter()
        .map(|p| PerformanceRow {
            platform: p.platform.to_string(),
            achieved: format_int(p.actual_views),
            target: format_int(p.target_views),
            progress: format!("{}%", format_number(p.percentage, 0)),
            tier: p.tier.to_string(),
        })
        .collect()
}

pub fn district_rows(view: &DatasetView) -> Vec<DistrictCodeRow> {
    view.district_codes
        .iter()
        .map(|d| DistrictCodeRow {
            code: d.code.clone(),
            district: d.district.clone(),
            lat: format_number(d.coordinate.lat, 2),
            lon: format_number(d.coordinate.lon, 2),
        })
        .collect()
}

fn describe(filter: &FilterSelection) -> String {
    format!(
        "District: {}, Month: {}, Platform: {}",
        filter.district, filter.month, filter.platform
    )
}

/// Prints every publication as markdown tables on stdout.
#[derive(Debug, Default)]
pub struct ConsolePublisher {
    pub last_status: Option<String>,
}

impl Publisher for ConsolePublisher {
    fn publish_result(&mut self, filter: &FilterSelection, dataset: &Dataset, result: &AggregateResult) {
        let note = format!("{}; dataset v{} from {}", describe(filter), dataset.version, dataset.origin);
        preview_table("Key Metrics", Some(&note), &kpi_rows(result), 1);
        preview_table("Platform Performance", None, &performance_rows(result), 4);
    }

    fn publish_dataset(&mut self, view: &DatasetView) {
        println!(
            "Dataset v{}: {} districts, months: {}\n",
            view.version,
            view.district_codes.len(),
            view.month_options[1..].join(", ")
        );
        preview_table("District Codes", None, &district_rows(view), usize::MAX);
    }

    fn publish_status(&mut self, status: &str) {
        println!("{}\n", status);
        self.last_status = Some(status.to_string());
    }
}

/// Everything the dashboard renders for one dataset + filter, as JSON.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub generated_at: DateTime<Utc>,
    pub dataset_version: u64,
    pub filter: &'a FilterSelection,
    pub result: AggregateResult,
    pub breakdown: Vec<BreakdownRow>,
    pub footprint: Vec<FootprintPoint>,
    pub engagement: Vec<EngagementPoint>,
}

impl<'a> Snapshot<'a> {
    pub fn build(dataset: &Dataset, filter: &'a FilterSelection) -> Self {
        let records = &dataset.records;
        Snapshot {
            generated_at: Utc::now(),
            dataset_version: dataset.version,
            filter,
            result: engine::aggregate(records, filter),
            breakdown: engine::platform_breakdown(records, filter),
            footprint: engine::district_footprint(records, filter),
            engagement: engine::engagement_points(records, filter),
        }
    }
}

/// Write `records.csv` and `snapshot.json` into `dir`. Returns both paths.
pub fn export(
    dir: &Path,
    dataset: &Dataset,
    filter: &FilterSelection,
) -> Result<(PathBuf, PathBuf), Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;
    let records_path = dir.join("records.csv");
    let filtered: Vec<&MetricRecord> = engine::filter_records(&dataset.records, filter).collect();
    write_csv(&records_path, &filtered)?;
    let snapshot_path = dir.join("snapshot.json");
    write_json(&snapshot_path, &Snapshot::build(dataset, filter))?;
    Ok((records_path, snapshot_path))
}

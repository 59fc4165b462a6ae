use crate::error::FieldResolutionWarning;
use crate::ingest::RawTable;
use crate::types::{MetricRecord, Platform, RawValue, RawWideRow, UNKNOWN};
use crate::util::{label_key, parse_count};
use std::collections::{BTreeSet, HashMap};

pub const TIMESTAMP_LABEL: &str = "Timestamp";
pub const DISTRICT_LABEL: &str = "District";
pub const MONTH_LABEL: &str = "Month";
pub const PLATFORM_LABEL: &str = "Platform";

const DISTRICT_ALIASES: &[&str] = &["District", "District Name", "Districts"];
const MONTH_ALIASES: &[&str] = &["Month", "Reporting Month", "Month Name"];
const PLATFORM_ALIASES: &[&str] = &["Platform", "Social Platform", "Channel"];

/// The four per-platform metrics a source row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    Posts,
    Interactions,
    Views,
    Followers,
}

impl MetricField {
    pub const ALL: [MetricField; 4] = [
        MetricField::Posts,
        MetricField::Interactions,
        MetricField::Views,
        MetricField::Followers,
    ];

    pub fn canonical(&self) -> &'static str {
        self.suffixes()[0]
    }

    /// Accepted wordings after the `"<Platform> - "` prefix, most preferred first.
    fn suffixes(&self) -> &'static [&'static str] {
        match self {
            MetricField::Posts => &["Total Posts", "Posts", "No of Posts", "Post Count"],
            MetricField::Interactions => &[
                "Total Interactions",
                "Interactions",
                "Total Engagements",
                "Engagements",
            ],
            MetricField::Views => &["Total Views", "Views", "Video Views", "Impressions"],
            MetricField::Followers => &[
                "Followers Gained",
                "New Followers",
                "Followers",
                "Subscribers Gained",
            ],
        }
    }

    /// Column names in a long-format sheet, which has no platform prefix.
    fn long_aliases(&self) -> &'static [&'static str] {
        match self {
            MetricField::Posts => &["Total_Posts", "Posts"],
            MetricField::Interactions => &["Total_Interactions", "Interactions", "Engagements"],
            MetricField::Views => &["Total_Views", "Views"],
            MetricField::Followers => &["Followers_Gained", "New Followers", "Followers"],
        }
    }
}

/// Canonical wide-format label, e.g. `"Instagram - Total Views"`.
pub fn metric_label(platform: Platform, field: MetricField) -> String {
    format!("{} - {}", platform, field.canonical())
}

fn wide_aliases(platform: Platform, field: MetricField) -> Vec<String> {
    field
        .suffixes()
        .iter()
        .map(|suffix| format!("{} - {}", platform, suffix))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per district × month with a column group per platform.
    Wide,
    /// Already one row per district × month × platform.
    Long,
}

#[derive(Debug, Clone)]
pub struct NormalizeReport {
    pub rows_read: usize,
    pub records_emitted: usize,
    pub layout: Layout,
    /// Long-format rows whose platform is outside the fixed set.
    pub skipped_rows: usize,
    pub warnings: Vec<FieldResolutionWarning>,
}

/// Maps comparison keys back to the source's own spelling of each header.
struct HeaderIndex {
    by_key: HashMap<String, String>,
}

impl HeaderIndex {
    fn new(headers: &[String]) -> Self {
        let mut by_key = HashMap::new();
        for h in headers {
            by_key.entry(label_key(h)).or_insert_with(|| h.clone());
        }
        HeaderIndex { by_key }
    }

    fn resolve<S: AsRef<str>>(
        &self,
        field: &str,
        aliases: &[S],
        warnings: &mut Vec<FieldResolutionWarning>,
    ) -> Option<String> {
        let hit = aliases
            .iter()
            .find_map(|a| self.by_key.get(&label_key(a.as_ref())).cloned());
        if hit.is_none() {
            warnings.push(FieldResolutionWarning {
                field: field.to_string(),
                tried: aliases.iter().map(|a| a.as_ref().to_string()).collect(),
            });
        }
        hit
    }
}

/// Column labels resolved once for the whole batch.
struct Columns {
    district: Option<String>,
    month: Option<String>,
    platform: Option<String>,
    wide: HashMap<(Platform, MetricField), Option<String>>,
    long: HashMap<MetricField, Option<String>>,
}

impl Columns {
    fn resolve(headers: &[String], layout: Layout, warnings: &mut Vec<FieldResolutionWarning>) -> Self {
        let index = HeaderIndex::new(headers);
        let district = index.resolve(DISTRICT_LABEL, DISTRICT_ALIASES, warnings);
        let month = index.resolve(MONTH_LABEL, MONTH_ALIASES, warnings);
        let mut cols = Columns {
            district,
            month,
            platform: None,
            wide: HashMap::new(),
            long: HashMap::new(),
        };
        match layout {
            Layout::Wide => {
                for platform in Platform::ALL {
                    for field in MetricField::ALL {
                        let label = metric_label(platform, field);
                        let hit = index.resolve(&label, wide_aliases(platform, field).as_slice(), warnings);
                        cols.wide.insert((platform, field), hit);
                    }
                }
            }
            Layout::Long => {
                cols.platform = index.resolve(PLATFORM_LABEL, PLATFORM_ALIASES, warnings);
                for field in MetricField::ALL {
                    let hit = index.resolve(field.long_aliases()[0], field.long_aliases(), warnings);
                    cols.long.insert(field, hit);
                }
            }
        }
        cols
    }
}

fn detect_layout(headers: &[String]) -> Layout {
    let keys: BTreeSet<String> = headers.iter().map(|h| label_key(h)).collect();
    if PLATFORM_ALIASES.iter().any(|a| keys.contains(&label_key(a))) {
        Layout::Long
    } else {
        Layout::Wide
    }
}

fn text_field(row: &RawWideRow, col: Option<&String>) -> String {
    col.and_then(|c| row.get(c))
        .and_then(RawValue::as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn count_field(row: &RawWideRow, col: Option<&Option<String>>) -> u64 {
    parse_count(col.and_then(|c| c.as_ref()).and_then(|c| row.get(c)))
}

/// Turn a source table into long-format records.
///
/// Wide tables fan out to one record per row and platform, including rows
/// whose metrics are all zero. Columns that cannot be found read as zero
/// and are reported as warnings rather than failing the batch.
pub fn normalize(table: &RawTable) -> (Vec<MetricRecord>, NormalizeReport) {
    let headers: Vec<String> = if table.headers.is_empty() {
        // Hand-built tables may omit the header list; fall back to the keys.
        let keys: BTreeSet<&String> = table.rows.iter().flat_map(|r| r.keys()).collect();
        keys.into_iter().cloned().collect()
    } else {
        table.headers.clone()
    };

    let layout = detect_layout(&headers);
    let mut warnings = Vec::new();
    let cols = Columns::resolve(&headers, layout, &mut warnings);
    for w in &warnings {
        tracing::warn!(field = %w.field, tried = ?w.tried, "column not found, reading as zero");
    }

    let mut records = Vec::with_capacity(table.rows.len() * Platform::ALL.len());
    let mut skipped_rows = 0usize;

    for row in &table.rows {
        let district = text_field(row, cols.district.as_ref());
        let month = text_field(row, cols.month.as_ref());
        match layout {
            Layout::Wide => {
                for platform in Platform::ALL {
                    let get = |field: MetricField| count_field(row, cols.wide.get(&(platform, field)));
                    records.push(MetricRecord::new(
                        district.clone(),
                        month.clone(),
                        platform,
                        get(MetricField::Posts),
                        get(MetricField::Interactions),
                        get(MetricField::Views),
                        get(MetricField::Followers),
                    ));
                }
            }
            Layout::Long => {
                let raw_platform = text_field(row, cols.platform.as_ref());
                let platform = match raw_platform.parse::<Platform>() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(%district, %month, error = %e, "skipping row");
                        skipped_rows += 1;
                        continue;
                    }
                };
                let get = |field: MetricField| count_field(row, cols.long.get(&field));
                records.push(MetricRecord::new(
                    district,
                    month,
                    platform,
                    get(MetricField::Posts),
                    get(MetricField::Interactions),
                    get(MetricField::Views),
                    get(MetricField::Followers),
                ));
            }
        }
    }

    let report = NormalizeReport {
        rows_read: table.rows.len(),
        records_emitted: records.len(),
        layout,
        skipped_rows,
        warnings,
    };
    tracing::info!(
        rows = report.rows_read,
        records = report.records_emitted,
        layout = ?report.layout,
        skipped = report.skipped_rows,
        missing_columns = report.warnings.len(),
        "normalized batch"
    );
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::read_csv;

    fn table(csv: &str) -> RawTable {
        read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn wide_rows_fan_out_per_platform() {
        let t = table(
            "Timestamp,District,Month,Facebook - Total Posts,Facebook - Total Interactions,Facebook - Total Views,Facebook - Followers Gained\n\
             2024-05-01,Kochi,May,10,200,1000,5\n\
             2024-06-01,Kochi,June,0,0,0,0\n",
        );
        let (records, report) = normalize(&t);
        assert_eq!(report.layout, Layout::Wide);
        assert_eq!(records.len(), 8);
        assert_eq!(report.records_emitted, 8);
        // 3 platforms × 4 metrics are absent.
        assert_eq!(report.warnings.len(), 12);
        let fb = &records[0];
        assert_eq!(fb.platform, Platform::Facebook);
        assert_eq!(fb.engagement_rate(), 20.0);
        assert_eq!(fb.followers_gained, 5);
        // All-zero records are still emitted.
        assert!(records[4..].iter().all(MetricRecord::is_all_zero));
    }

    #[test]
    fn labels_tolerate_spacing_case_and_wording() {
        let t = table(
            "district ,MONTH,instagram -  views ,Instagram_Total_Posts,INSTAGRAM - Engagements,Instagram - New Followers\n\
             Goa,July,\"1,500\",3,45,7\n",
        );
        let (records, _) = normalize(&t);
        let ig = records.iter().find(|r| r.platform == Platform::Instagram).unwrap();
        assert_eq!(ig.district, "Goa");
        assert_eq!(ig.month, "July");
        assert_eq!(ig.total_views(), 1500);
        assert_eq!(ig.total_posts, 3);
        assert_eq!(ig.total_interactions(), 45);
        assert_eq!(ig.followers_gained, 7);
        assert!((ig.engagement_rate() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn preferred_alias_wins_over_alternates() {
        let t = table("District,Month,YouTube - Views,YouTube - Total Views\nA,B,1,2\n");
        let (records, _) = normalize(&t);
        let yt = records.iter().find(|r| r.platform == Platform::YouTube).unwrap();
        assert_eq!(yt.total_views(), 2);
    }

    #[test]
    fn blanks_and_garbage_degrade_to_defaults() {
        let t = table(
            "District,Month,WhatsApp - Total Posts,WhatsApp - Total Views\n\
             ,,abc,-20\n",
        );
        let (records, report) = normalize(&t);
        assert_eq!(report.rows_read, 1);
        let wa = records.iter().find(|r| r.platform == Platform::WhatsApp).unwrap();
        assert_eq!(wa.district, UNKNOWN);
        assert_eq!(wa.month, UNKNOWN);
        assert_eq!(wa.total_posts, 0);
        assert_eq!(wa.total_views(), 0);
        assert_eq!(wa.engagement_rate(), 0.0);
    }

    #[test]
    fn missing_identity_columns_become_unknown() {
        let t = table("Facebook - Total Posts\n4\n");
        let (records, report) = normalize(&t);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.district == UNKNOWN && r.month == UNKNOWN));
        assert!(report.warnings.iter().any(|w| w.field == DISTRICT_LABEL));
        assert!(report.warnings.iter().any(|w| w.field == MONTH_LABEL));
    }

    #[test]
    fn long_format_passes_through() {
        let t = table(
            "District,Month,Platform,Total_Posts,Total_Interactions,Total_Views,Followers_Gained\n\
             Kannur,March,Instagram,4,80,400,9\n\
             Kannur,March,Twitter,1,1,1,1\n\
             Kannur,March,Youtube,2,0,0,0\n",
        );
        let (records, report) = normalize(&t);
        assert_eq!(report.layout, Layout::Long);
        assert_eq!(records.len(), 2);
        assert_eq!(report.skipped_rows, 1);
        assert!(report.warnings.is_empty());
        assert_eq!(records[0].engagement_rate(), 20.0);
        assert_eq!(records[1].platform, Platform::YouTube);
    }

    #[test]
    fn headerless_tables_use_row_keys() {
        let mut row = RawWideRow::new();
        row.insert("District".into(), RawValue::Text("Kochi".into()));
        row.insert("Facebook - Total Views".into(), RawValue::Number(250.0));
        let t = RawTable { headers: vec![], rows: vec![row] };
        let (records, _) = normalize(&t);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].total_views(), 250);
        assert_eq!(records[0].month, UNKNOWN);
    }
}

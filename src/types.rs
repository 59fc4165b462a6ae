use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Sentinel value used by every filter field and prepended to option lists.
pub const ALL: &str = "All";

/// Placeholder for a district or month the source left blank.
pub const UNKNOWN: &str = "Unknown";

/// One cell as delivered by a source, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
}

impl RawValue {
    pub fn from_text(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(t.to_string())
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            RawValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// A source row keyed by its column label exactly as the source spelled it.
pub type RawWideRow = HashMap<String, RawValue>;

/// The fixed set of platforms every wide row carries a column group for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    Facebook,
    Instagram,
    YouTube,
    WhatsApp,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::YouTube,
        Platform::WhatsApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::YouTube => "YouTube",
            Platform::WhatsApp => "WhatsApp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "youtube" | "yt" => Ok(Platform::YouTube),
            "whatsapp" | "wa" => Ok(Platform::WhatsApp),
            _ => Err(format!("unknown platform: {}", s.trim())),
        }
    }
}

/// One district × month × platform observation.
///
/// `engagement_rate` is private so it can only be produced by recomputing it
/// from the interaction and view counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Platform")]
    pub platform: Platform,
    #[serde(rename = "Total_Posts")]
    pub total_posts: u64,
    #[serde(rename = "Total_Interactions")]
    total_interactions: u64,
    #[serde(rename = "Total_Views")]
    total_views: u64,
    #[serde(rename = "Followers_Gained")]
    pub followers_gained: u64,
    #[serde(rename = "Engagement_Rate")]
    engagement_rate: f64,
}

impl MetricRecord {
    pub fn new(
        district: String,
        month: String,
        platform: Platform,
        total_posts: u64,
        total_interactions: u64,
        total_views: u64,
        followers_gained: u64,
    ) -> Self {
        MetricRecord {
            district,
            month,
            platform,
            total_posts,
            total_interactions,
            total_views,
            followers_gained,
            engagement_rate: engagement_rate(total_interactions, total_views),
        }
    }

    pub fn total_interactions(&self) -> u64 {
        self.total_interactions
    }

    pub fn total_views(&self) -> u64 {
        self.total_views
    }

    pub fn engagement_rate(&self) -> f64 {
        self.engagement_rate
    }

    pub fn set_interactions(&mut self, interactions: u64) {
        self.total_interactions = interactions;
        self.engagement_rate = engagement_rate(self.total_interactions, self.total_views);
    }

    pub fn set_views(&mut self, views: u64) {
        self.total_views = views;
        self.engagement_rate = engagement_rate(self.total_interactions, self.total_views);
    }

    pub fn is_all_zero(&self) -> bool {
        self.total_posts == 0
            && self.total_interactions == 0
            && self.total_views == 0
            && self.followers_gained == 0
    }
}

/// Interactions per hundred views; zero when nothing was viewed.
pub fn engagement_rate(interactions: u64, views: u64) -> f64 {
    if views == 0 {
        0.0
    } else {
        (interactions as f64 / views as f64) * 100.0
    }
}

/// The current district/month/platform selection. Each field is either a
/// concrete value or [`ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub district: String,
    pub month: String,
    pub platform: String,
}

impl Default for FilterSelection {
    fn default() -> Self {
        FilterSelection {
            district: ALL.to_string(),
            month: ALL.to_string(),
            platform: ALL.to_string(),
        }
    }
}

impl FilterSelection {
    pub fn new(district: &str, month: &str, platform: &str) -> Self {
        FilterSelection {
            district: district.to_string(),
            month: month.to_string(),
            platform: platform.to_string(),
        }
    }

    pub fn matches(&self, record: &MetricRecord) -> bool {
        field_matches(&self.district, &record.district)
            && field_matches(&self.month, &record.month)
            && field_matches(&self.platform, record.platform.as_str())
    }

    /// Fold a partial update into the selection. Returns whether anything changed.
    pub fn apply(&mut self, update: &FilterUpdate) -> bool {
        let before = self.clone();
        if let Some(d) = &update.district {
            self.district = d.clone();
        }
        if let Some(m) = &update.month {
            self.month = m.clone();
        }
        if let Some(p) = &update.platform {
            self.platform = p.clone();
        }
        *self != before
    }
}

fn field_matches(selected: &str, value: &str) -> bool {
    selected == ALL || selected == value
}

/// A selection event from the presentation layer; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub district: Option<String>,
    pub month: Option<String>,
    pub platform: Option<String>,
}

impl FilterUpdate {
    pub fn district(value: &str) -> Self {
        FilterUpdate { district: Some(value.to_string()), ..Default::default() }
    }

    pub fn month(value: &str) -> Self {
        FilterUpdate { month: Some(value.to_string()), ..Default::default() }
    }

    pub fn platform(value: &str) -> Self {
        FilterUpdate { platform: Some(value.to_string()), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    #[serde(rename = "Excellent")]
    Excellent,
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformPerformance {
    pub platform: Platform,
    pub actual_views: u64,
    pub target_views: u64,
    pub percentage: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub total_posts: u64,
    pub total_interactions: u64,
    pub total_views: u64,
    pub followers_gained: u64,
    pub platforms: Vec<PlatformPerformance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Display code and map position for one district.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictCode {
    pub district: String,
    pub code: String,
    pub coordinate: Coordinate,
    /// True when the district was not in the reference table.
    pub fallback: bool,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[tabled(rename = "TotalPosts")]
    pub total_posts: String,
    #[tabled(rename = "TotalInteractions")]
    pub total_interactions: String,
    #[tabled(rename = "TotalViews")]
    pub total_views: String,
    #[tabled(rename = "FollowersGained")]
    pub followers_gained: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PerformanceRow {
    #[tabled(rename = "Platform")]
    pub platform: String,
    #[tabled(rename = "Achieved")]
    pub achieved: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Progress")]
    pub progress: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DistrictCodeRow {
    #[tabled(rename = "Code")]
    pub code: String,
    #[tabled(rename = "District")]
    pub district: String,
    #[tabled(rename = "Lat")]
    pub lat: String,
    #[tabled(rename = "Lon")]
    pub lon: String,
}

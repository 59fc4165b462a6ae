use crate::resolver;
use crate::types::{
    AggregateResult, Coordinate, FilterSelection, MetricRecord, Platform, PlatformPerformance,
    Tier, ALL,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Expected views for each post published.
pub const TARGET_VIEWS_PER_POST: u64 = 2500;
/// Target used for a platform with no records under the current filter.
pub const MIN_TARGET_VIEWS: u64 = 1000;
/// Added on top of achieved views once the computed target is reached.
pub const TARGET_HEADROOM: u64 = 1000;

pub const EXCELLENT_THRESHOLD: f64 = 80.0;
pub const GOOD_THRESHOLD: f64 = 60.0;

/// Records passing every non-`All` field of the filter.
pub fn filter_records<'a>(
    records: &'a [MetricRecord],
    filter: &'a FilterSelection,
) -> impl Iterator<Item = &'a MetricRecord> + 'a {
    records.iter().filter(move |r| filter.matches(r))
}

pub fn tier_for(percentage: f64) -> Tier {
    if percentage >= EXCELLENT_THRESHOLD {
        Tier::Excellent
    } else if percentage >= GOOD_THRESHOLD {
        Tier::Good
    } else {
        Tier::NeedsImprovement
    }
}

/// Progress of achieved views against a target. When the target is already
/// met it is pushed to `actual + TARGET_HEADROOM`.
pub fn platform_performance(platform: Platform, actual_views: u64, target_views: u64) -> PlatformPerformance {
    let target_views = if actual_views >= target_views {
        actual_views.saturating_add(TARGET_HEADROOM)
    } else {
        target_views
    };
    let percentage = if target_views > 0 {
        ((actual_views as f64 / target_views as f64) * 100.0).min(100.0)
    } else {
        0.0
    };
    PlatformPerformance {
        platform,
        actual_views,
        target_views,
        percentage,
        tier: tier_for(percentage),
    }
}

#[derive(Default)]
struct PlatformAcc {
    records: usize,
    posts: u64,
    views: u64,
}

/// KPI totals and per-platform performance over the filtered records.
///
/// Pure: the same records and filter always give the same result. An empty
/// selection is a valid result with zero totals and minimum targets.
pub fn aggregate(records: &[MetricRecord], filter: &FilterSelection) -> AggregateResult {
    let mut result = AggregateResult {
        total_posts: 0,
        total_interactions: 0,
        total_views: 0,
        followers_gained: 0,
        platforms: Vec::with_capacity(Platform::ALL.len()),
    };
    let mut by_platform: HashMap<Platform, PlatformAcc> = HashMap::new();

    for r in filter_records(records, filter) {
        result.total_posts = result.total_posts.saturating_add(r.total_posts);
        result.total_interactions = result.total_interactions.saturating_add(r.total_interactions());
        result.total_views = result.total_views.saturating_add(r.total_views());
        result.followers_gained = result.followers_gained.saturating_add(r.followers_gained);

        let acc = by_platform.entry(r.platform).or_default();
        acc.records += 1;
        acc.posts = acc.posts.saturating_add(r.total_posts);
        acc.views = acc.views.saturating_add(r.total_views());
    }

    for platform in Platform::ALL {
        let perf = match by_platform.get(&platform) {
            Some(acc) if acc.records > 0 => {
                platform_performance(platform, acc.views, acc.posts.saturating_mul(TARGET_VIEWS_PER_POST))
            }
            _ => platform_performance(platform, 0, MIN_TARGET_VIEWS),
        };
        result.platforms.push(perf);
    }
    result
}

/// Distinct values in first-seen order with [`ALL`] in front.
pub fn options<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = vec![ALL.to_string()];
    for v in values {
        if seen.insert(v) {
            out.push(v.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub platform: Platform,
    pub district: String,
    pub total_interactions: u64,
}

/// Interactions per platform and district over the filtered records, the
/// series behind the grouped bar chart.
pub fn platform_breakdown(records: &[MetricRecord], filter: &FilterSelection) -> Vec<BreakdownRow> {
    let mut district_order: Vec<&str> = Vec::new();
    let mut sums: HashMap<(Platform, &str), u64> = HashMap::new();
    for r in filter_records(records, filter) {
        if !district_order.contains(&r.district.as_str()) {
            district_order.push(&r.district);
        }
        let sum = sums.entry((r.platform, r.district.as_str())).or_default();
        *sum = sum.saturating_add(r.total_interactions());
    }
    let mut rows = Vec::new();
    for platform in Platform::ALL {
        for district in &district_order {
            if let Some(total) = sums.get(&(platform, *district)) {
                rows.push(BreakdownRow {
                    platform,
                    district: district.to_string(),
                    total_interactions: *total,
                });
            }
        }
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintPoint {
    pub district: String,
    pub code: String,
    pub platform: Platform,
    pub total_interactions: u64,
    pub total_views: u64,
    pub coordinate: Coordinate,
}

/// Per district and platform sums placed on the map. Only produced when no
/// single district is selected.
pub fn district_footprint(records: &[MetricRecord], filter: &FilterSelection) -> Vec<FootprintPoint> {
    if filter.district != ALL {
        return Vec::new();
    }
    let mut order: Vec<(&str, Platform)> = Vec::new();
    let mut sums: HashMap<(&str, Platform), (u64, u64)> = HashMap::new();
    for r in filter_records(records, filter) {
        let key = (r.district.as_str(), r.platform);
        let e = sums.entry(key).or_insert_with(|| {
            order.push(key);
            (0, 0)
        });
        e.0 = e.0.saturating_add(r.total_interactions());
        e.1 = e.1.saturating_add(r.total_views());
    }
    order
        .into_iter()
        .map(|(district, platform)| {
            let (interactions, views) = sums[&(district, platform)];
            let (coordinate, _) = resolver::coordinate(district);
            FootprintPoint {
                district: district.to_string(),
                code: resolver::district_code(district),
                platform,
                total_interactions: interactions,
                total_views: views,
                coordinate,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementPoint {
    pub platform: Platform,
    pub month: String,
    pub total_posts: u64,
    pub engagement_rate: f64,
    pub total_interactions: u64,
}

/// Posts against engagement rate for each record of the selected district.
/// Empty unless a single district is selected.
pub fn engagement_points(records: &[MetricRecord], filter: &FilterSelection) -> Vec<EngagementPoint> {
    if filter.district == ALL {
        return Vec::new();
    }
    filter_records(records, filter)
        .map(|r| EngagementPoint {
            platform: r.platform,
            month: r.month.clone(),
            total_posts: r.total_posts,
            engagement_rate: r.engagement_rate(),
            total_interactions: r.total_interactions(),
        })
        .collect()
}

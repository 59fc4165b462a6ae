//! Display codes and map coordinates for districts discovered in the data.

use crate::types::{Coordinate, DistrictCode};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Labels that stand for a roll-up rather than a real district.
const AGGREGATE_LABELS: &[&str] = &["State Entry", "Unknown"];
pub const AGGREGATE_CODE: &str = "ST";

/// Used for any district missing from the reference table.
pub const STATE_CENTROID: Coordinate = Coordinate { lat: 10.8505, lon: 76.2711 };

pub const REFERENCE_DISTRICTS: &[(&str, Coordinate)] = &[
    ("Kozhikode", Coordinate { lat: 11.25, lon: 75.77 }),
    ("Malappuram", Coordinate { lat: 11.07, lon: 76.07 }),
    ("Kannur", Coordinate { lat: 11.87, lon: 75.37 }),
    ("Thrissur", Coordinate { lat: 10.52, lon: 76.21 }),
    ("Palakkad", Coordinate { lat: 10.77, lon: 76.65 }),
    ("Thiruvananthapuram", Coordinate { lat: 8.52, lon: 76.94 }),
    ("Kollam", Coordinate { lat: 8.89, lon: 76.61 }),
    ("Pathanamthitta", Coordinate { lat: 9.26, lon: 76.79 }),
    ("Alappuzha", Coordinate { lat: 9.50, lon: 76.34 }),
    ("Kottayam", Coordinate { lat: 9.59, lon: 76.52 }),
    ("Idukki", Coordinate { lat: 9.85, lon: 76.97 }),
    ("Ernakulam", Coordinate { lat: 9.98, lon: 76.28 }),
    ("Kochi", Coordinate { lat: 9.93, lon: 76.27 }),
    ("Wayanad", Coordinate { lat: 11.61, lon: 76.08 }),
    ("Kasaragod", Coordinate { lat: 12.50, lon: 74.99 }),
];

static COORDS_BY_NAME: Lazy<HashMap<String, Coordinate>> = Lazy::new(|| {
    REFERENCE_DISTRICTS
        .iter()
        .map(|(name, c)| (name.to_lowercase(), *c))
        .collect()
});

/// Short code for a district, first matching rule wins:
/// aggregate label, three characters or fewer, initials of a multi-word
/// name, else the first three characters.
pub fn district_code(district: &str) -> String {
    let name = district.trim();
    if AGGREGATE_LABELS.iter().any(|l| l.eq_ignore_ascii_case(name)) {
        return AGGREGATE_CODE.to_string();
    }
    if name.chars().count() <= 3 {
        return name.to_uppercase();
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() > 1 {
        return words
            .iter()
            .filter_map(|w| w.chars().next())
            .flat_map(char::to_uppercase)
            .collect();
    }
    name.chars().take(3).collect::<String>().to_uppercase()
}

/// Reference coordinate for a district, or the state centroid. The flag is
/// true when the centroid was substituted.
pub fn coordinate(district: &str) -> (Coordinate, bool) {
    match COORDS_BY_NAME.get(&district.trim().to_lowercase()) {
        Some(c) => (*c, false),
        None => (STATE_CENTROID, true),
    }
}

/// Codes and coordinates for each distinct district, in first-seen order.
pub fn resolve_districts<'a, I>(districts: I) -> Vec<DistrictCode>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for d in districts {
        if !seen.insert(d) {
            continue;
        }
        let (coordinate, fallback) = coordinate(d);
        if fallback {
            tracing::debug!(district = d, "no reference coordinate, using state centroid");
        }
        out.push(DistrictCode {
            district: d.to_string(),
            code: district_code(d),
            coordinate,
            fallback,
        });
    }
    out
}

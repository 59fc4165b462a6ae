// Helpers for coercing spreadsheet cells and formatting numbers.
//
// All the "dirty" cell handling lives here so the normalizer can assume
// clean, typed values.
use crate::types::RawValue;
use num_format::{Locale, ToFormattedString};

/// Coerce a cell into a non-negative count, forgiving the formatting noise
/// common in sheet exports.
///
/// - Trims whitespace and strips thousands separators.
/// - Fractional values truncate toward zero.
/// - Negative, non-finite, non-numeric or missing input becomes `0`.
pub fn parse_count(v: Option<&RawValue>) -> u64 {
    let n = match v {
        None | Some(RawValue::Empty) => return 0,
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Text(s)) => match parse_f64_safe(s) {
            Some(n) => n,
            None => return 0,
        },
    };
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    // `as` saturates for values beyond u64::MAX.
    n.trunc() as u64
}

/// Parse a text cell into `f64`, returning `None` for anything that is not
/// plainly a number. A single `e`/`E` exponent is accepted (`1.5e3`); other
/// letters reject the cell, which keeps `NaN` and `inf` out.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let letters: Vec<char> = s.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if letters.len() > 1 || letters.iter().any(|c| !matches!(c, 'e' | 'E')) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok()
}

/// Label comparison key: lowercased letters and digits only (Unicode aware), so
/// `"Facebook - Total Posts "` and `"facebook_total_posts"` collapse together.
pub fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimal places plus locale thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

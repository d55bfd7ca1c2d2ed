//! Display helpers. Absent values render as `N/A`.

use num_format::{Locale, ToFormattedString};

pub const NA: &str = "N/A";

fn grouped(int_part: i64) -> String {
    int_part.to_formatted_string(&Locale::en)
}

/// Number with digit grouping and at most three decimals: `1234.5678` -> `1,234.568`.
pub fn fmt_or_na(val: Option<f64>) -> String {
    match val {
        Some(x) if x.is_finite() => {
            let rounded = (x * 1000.0).round() / 1000.0;
            let sign = if rounded < 0.0 { "-" } else { "" };
            let abs = rounded.abs();
            let int_part = abs.trunc() as i64;
            let frac = format!("{:.3}", abs - abs.trunc());
            // "0.500" -> "5"
            let frac = frac
                .trim_start_matches('0')
                .trim_start_matches('.')
                .trim_end_matches('0');
            if frac.is_empty() {
                format!("{}{}", sign, grouped(int_part))
            } else {
                format!("{}{}.{}", sign, grouped(int_part), frac)
            }
        }
        _ => NA.to_string(),
    }
}

/// Whole US dollars: `1234.6` -> `$1,235`.
pub fn cur_or_na(val: Option<f64>) -> String {
    match val {
        Some(x) if x.is_finite() => {
            let r = x.round() as i64;
            if r < 0 {
                format!("-${}", grouped(-r))
            } else {
                format!("${}", grouped(r))
            }
        }
        _ => NA.to_string(),
    }
}

/// Ratio as a percentage with one decimal: `0.1234` -> `12.3%`.
pub fn pct_or_na(val: Option<f64>) -> String {
    match val {
        Some(x) if x.is_finite() => format!("{:.1}%", x * 100.0),
        _ => NA.to_string(),
    }
}

/// Plain `to_string`, integral values without a fraction.
pub fn or_na(val: Option<f64>) -> String {
    match val {
        Some(x) if x.is_finite() && x.fract() == 0.0 => format!("{}", x as i64),
        Some(x) if x.is_finite() => x.to_string(),
        _ => NA.to_string(),
    }
}

//! Deterministic text rules: numeral conversion, date formatting, and
//! archive-name sanitisation.
//!
//! Every function here is a pure `&str`/value → `String` transform with no
//! shared state. Keeping them together (rather than scattered through the
//! layout engine) means each rule is independently testable and the layout
//! engine stays an interpreter of template data.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Convert a class/level string to Roman numerals using standard subtractive
/// notation (4 → "IV", 9 → "IX", 40 → "XL").
///
/// Non-numeric input comes back unchanged: kindergarten levels like "KG"
/// print as-is rather than erroring.
pub fn to_roman(value: &str) -> String {
    let trimmed = value.trim();
    let Ok(mut n) = trimmed.parse::<u32>() else {
        return trimmed.to_string();
    };

    const VALUES: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut roman = String::new();
    for (value, symbol) in VALUES {
        while n >= value {
            roman.push_str(symbol);
            n -= value;
        }
    }
    roman
}

/// Format a date in the single long-form pattern every document uses:
/// day without padding, full month name, four-digit year.
pub fn format_long_date(date: NaiveDate) -> String {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    format!(
        "{} {} {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

// ── Archive entry naming ─────────────────────────────────────────────────

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Replace every run of characters outside `[A-Za-z0-9_-]` with a single
/// underscore, so roster identifiers like `12/A` become stable, portable
/// archive entry names.
pub fn sanitize_component(raw: &str) -> String {
    RE_UNSAFE.replace_all(raw, "_").into_owned()
}

//! Per-field parsing and formatting rules shared by encode and decode.

use std::borrow::Cow;

use rust_decimal::{Decimal, RoundingStrategy};
use time::{
    Date, PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

/// The date formats accepted on import, tried in order; first match wins.
///
/// The US format is tried before the EU one, so an ambiguous value such as
/// `03/04/2025` parses as March 4th.
const DATE_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[month]/[day]/[year]"),
    format_description!("[day]/[month]/[year]"),
    format_description!("[year]/[month]/[day]"),
];

/// ISO date-time variants accepted on import; only the date part is kept.
const DATETIME_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
];

/// The largest magnitude accepted for any money field: 10^13.
fn max_amount_magnitude() -> Decimal {
    Decimal::new(10_000_000_000_000, 0)
}

/// Parse a date cell against the accepted format list.
pub fn parse_date(value: &str) -> Result<Date, String> {
    let value = value.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = Date::parse(value, format) {
            return Ok(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = PrimitiveDateTime::parse(value, format) {
            return Ok(datetime.date());
        }
    }

    Err(format!("\"{value}\" is not a recognised date"))
}

/// Parse a money cell as an exact decimal.
///
/// Thousands separators (`,`, `_`, space) and a leading currency symbol are
/// stripped before parsing; anything else in the cell is a row error.
/// Values with more than two decimal places are silently rounded to two;
/// values whose magnitude exceeds 10^13 are rejected.
pub fn parse_amount(value: &str) -> Result<Decimal, String> {
    let cleaned = value.trim().replace([',', '_', ' '], "");
    let cleaned = cleaned.strip_prefix("R$").unwrap_or(cleaned.as_str());
    let cleaned = cleaned.trim_start_matches(['$', '€', '£', '¥']);

    let amount = cleaned
        .parse::<Decimal>()
        .map_err(|_| format!("\"{value}\" is not a valid amount"))?;

    if amount.abs() > max_amount_magnitude() {
        return Err(format!("\"{value}\" exceeds the maximum allowed amount"));
    }

    if amount.scale() > 2 {
        return Ok(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero));
    }

    Ok(amount)
}

/// Parse a boolean cell permissively; unrecognised values are false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "t" | "y"
    )
}

/// Parse a non-negative integer cell, e.g. an installment count.
pub fn parse_integer(value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("\"{value}\" is not a valid whole number"))
}

/// Parse a statement due day, which must fall within a calendar month.
pub fn parse_due_day(value: &str) -> Result<u8, String> {
    let day = value
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("\"{value}\" is not a valid day of month"))?;

    if !(1..=31).contains(&day) {
        return Err(format!("\"{value}\" is not a valid day of month"));
    }

    Ok(day)
}

/// Prefix cells that spreadsheet software would evaluate as a formula.
///
/// A value beginning with `=`, `+`, `-` or `@` is prefixed with a quote
/// character so that opening the exported file in a spreadsheet cannot
/// execute attacker-controlled formulas.
pub fn guard_formula(value: &str) -> Cow<'_, str> {
    if value.starts_with(['=', '+', '-', '@']) {
        Cow::Owned(format!("'{value}"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Undo the export-side formula guard.
///
/// Only a quote directly followed by a formula-starting character is
/// stripped, so ordinary values that happen to start with an apostrophe
/// pass through untouched. A value that genuinely began with `'=` before
/// export is therefore not round-trip safe.
pub fn strip_formula_guard(value: &str) -> &str {
    match value.strip_prefix('\'') {
        Some(rest) if rest.starts_with(['=', '+', '-', '@']) => rest,
        _ => value,
    }
}

#[cfg(test)]
mod field_tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use super::{
        guard_formula, max_amount_magnitude, parse_amount, parse_bool, parse_date, parse_due_day,
        strip_formula_guard,
    };

    #[test]
    fn max_amount_magnitude_is_ten_to_the_thirteen() {
        assert_eq!(
            max_amount_magnitude(),
            "10000000000000".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn parse_date_accepts_all_formats() {
        let cases = [
            ("2025-03-04", date!(2025 - 03 - 04)),
            ("03/04/2025", date!(2025 - 03 - 04)),
            ("25/12/2025", date!(2025 - 12 - 25)),
            ("2025/03/04", date!(2025 - 03 - 04)),
            ("2025-03-04T13:45:00", date!(2025 - 03 - 04)),
            ("2025-03-04 13:45:00", date!(2025 - 03 - 04)),
        ];

        for (input, want) in cases {
            let got = parse_date(input).expect("date should parse");
            assert_eq!(got, want, "parsing {input}: want {want}, got {got}");
        }
    }

    #[test]
    fn parse_date_prefers_us_over_eu_for_ambiguous_values() {
        assert_eq!(parse_date("03/04/2025"), Ok(date!(2025 - 03 - 04)));
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2025-13-01").is_err());
    }

    #[test]
    fn parse_amount_strips_separators_and_symbols() {
        assert_eq!(parse_amount("$1,234.56"), Ok(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("€ 99.00"), Ok(Decimal::new(9900, 2)));
        assert_eq!(parse_amount("-42"), Ok(Decimal::new(-42, 0)));
    }

    #[test]
    fn parse_amount_rejects_embedded_garbage() {
        assert!(parse_amount("12abc34").is_err());
        assert!(parse_amount("12.3.4").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn parse_amount_rounds_excess_precision_to_two_places() {
        assert_eq!(parse_amount("10.005"), Ok(Decimal::new(1001, 2)));
        assert_eq!(parse_amount("10.004"), Ok(Decimal::new(1000, 2)));
    }

    #[test]
    fn parse_amount_rejects_magnitude_above_limit() {
        assert!(parse_amount("10000000000000.01").is_err());
        assert!(parse_amount("-99999999999999").is_err());
        assert!(parse_amount("10000000000000").is_ok());
    }

    #[test]
    fn parse_bool_is_permissive() {
        for truthy in ["true", "YES", "1", "t", "Y"] {
            assert!(parse_bool(truthy), "{truthy} should parse as true");
        }

        for falsy in ["false", "no", "0", "maybe", ""] {
            assert!(!parse_bool(falsy), "{falsy} should parse as false");
        }
    }

    #[test]
    fn parse_due_day_bounds() {
        assert_eq!(parse_due_day("15"), Ok(15));
        assert!(parse_due_day("0").is_err());
        assert!(parse_due_day("32").is_err());
    }

    #[test]
    fn guard_formula_prefixes_formula_starters() {
        assert_eq!(guard_formula("=1+1"), "'=1+1");
        assert_eq!(guard_formula("@SUM(A1)"), "'@SUM(A1)");
        assert_eq!(guard_formula("+64 21 555 0123"), "'+64 21 555 0123");
        assert_eq!(guard_formula("-credit"), "'-credit");
        assert_eq!(guard_formula("Groceries"), "Groceries");
    }

    #[test]
    fn strip_formula_guard_only_removes_guard_patterns() {
        assert_eq!(strip_formula_guard("'=1+1"), "=1+1");
        assert_eq!(strip_formula_guard("'@cmd"), "@cmd");
        assert_eq!(strip_formula_guard("'hello"), "'hello");
        assert_eq!(strip_formula_guard("plain"), "plain");
    }
}

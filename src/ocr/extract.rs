//! Heuristic parsers for raw OCR text.
//!
//! Each function takes the trimmed Tesseract output of one field and returns
//! a typed value, or None when the text cannot be trusted. Callers decide the
//! fallback.

use regex::Regex;
use std::sync::LazyLock;

/// Digits with an optional fractional part, e.g. "99.1234"
static DECIMAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid decimal pattern"));

/// Parses a non-negative integer such as a score, note count or level.
pub fn parse_integer(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parses the line count. Only 4 and 6 exist in the game.
pub fn parse_line_count(text: &str) -> Option<u8> {
    match parse_integer(text)? {
        4 => Some(4),
        6 => Some(6),
        _ => None,
    }
}

/// Restores a decimal point that OCR dropped.
///
/// Two-decimal values lose their dot often enough that any dot-less reading
/// of three or more characters is assumed to be `NNN` -> `N.NN`.
pub fn insert_decimal_point(text: &str) -> String {
    let text = text.trim();
    if text.contains('.') || text.chars().count() < 3 {
        return text.to_string();
    }
    let split = match text.char_indices().rev().nth(1) {
        Some((idx, _)) => idx,
        None => return text.to_string(),
    };
    format!("{}.{}", &text[..split], &text[split..])
}

/// Parses a decimal value such as a rating ("630.00") or an accuracy
/// ("99.5120%"). A dropped decimal point is restored first.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '%').collect();
    let repaired = insert_decimal_point(&cleaned);
    if !DECIMAL_PATTERN.is_match(&repaired) {
        return None;
    }
    repaired.parse().ok()
}

/// Joins a value displayed as two separately rendered halves.
///
/// The minor half is zero-padded to `width` digits behind the decimal point:
/// `join_split_value(641, 5, 2)` is 641.05 and `join_split_value(99, 512, 4)`
/// is 99.0512.
pub fn join_split_value(major: u32, minor: u32, width: usize) -> f64 {
    let text = format!("{}.{:0width$}", major, minor, width = width);
    text.parse().unwrap_or(major as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("12345"), Some(12345));
        assert_eq!(parse_integer(" 0 "), Some(0));
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("12 34"), None);
        assert_eq!(parse_integer("-3"), None);
        assert_eq!(parse_integer("99999999999"), None, "Overflow should not parse");
    }

    #[test]
    fn test_parse_line_count() {
        assert_eq!(parse_line_count("4"), Some(4));
        assert_eq!(parse_line_count("6"), Some(6));
        assert_eq!(parse_line_count("46"), None);
        assert_eq!(parse_line_count(""), None);
    }

    #[test]
    fn test_insert_decimal_point() {
        assert_eq!(insert_decimal_point("279"), "2.79");
        assert_eq!(insert_decimal_point("63000"), "630.00");
        assert_eq!(insert_decimal_point("2.79"), "2.79");
        assert_eq!(insert_decimal_point("79"), "79");
        assert_eq!(insert_decimal_point(""), "");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("630.00"), Some(630.0));
        assert_eq!(parse_decimal("63000"), Some(630.0));
        assert_eq!(parse_decimal("99.5120%"), Some(99.512));
        assert_eq!(parse_decimal("1.2.3"), None);
        assert_eq!(parse_decimal("."), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_join_split_value() {
        assert_eq!(join_split_value(641, 5, 2), 641.05);
        assert_eq!(join_split_value(641, 22, 2), 641.22);
        assert_eq!(join_split_value(99, 512, 4), 99.0512);
        assert_eq!(join_split_value(100, 0, 4), 100.0);
    }
}

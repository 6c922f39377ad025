//! Small shared helpers: date parsing and parse-or-default JSON decoding.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

/// Parse a message date that may be RFC 2822 (mail headers) or RFC 3339.
/// Returns `None` for anything unparseable; callers treat that as missing
/// data, never an error.
pub fn parse_mail_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    // Bare dates ("2024-01-01") show up in sender_temporal
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

/// Whole days elapsed since `raw`, or `None` if it doesn't parse.
pub fn days_since(raw: &str) -> Option<i64> {
    parse_mail_date(raw).map(|dt| (Utc::now() - dt).num_days())
}

/// Decode a JSON column, substituting the type's default on NULL, empty, or
/// malformed input. This is the engine-wide recovery path for data-quality
/// errors: aggregated JSON fields are best-effort, never fatal.
pub fn parse_json_or_default<T: DeserializeOwned + Default>(raw: Option<&str>) -> T {
    match raw {
        Some(s) if !s.trim().is_empty() => serde_json::from_str(s).unwrap_or_default(),
        _ => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc2822_and_rfc3339() {
        assert!(parse_mail_date("Mon, 01 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_mail_date("2024-01-01T12:00:00Z").is_some());
        assert!(parse_mail_date("2024-01-01").is_some());
        assert!(parse_mail_date("yesterday-ish").is_none());
        assert!(parse_mail_date("").is_none());
    }

    #[test]
    fn malformed_json_yields_default() {
        let v: Vec<String> = parse_json_or_default(Some("{not json"));
        assert!(v.is_empty());
        let v: Vec<String> = parse_json_or_default(None);
        assert!(v.is_empty());
        let v: Vec<String> = parse_json_or_default(Some("[\"a\",\"b\"]"));
        assert_eq!(v, vec!["a", "b"]);
    }
}

//! Lenient coercion of remote field values. List stores return JSON with
//! inconsistent scalar typing across deployments, so every read goes
//! through these helpers instead of exact-type matches.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Invariant string conversion. Null and structured values yield `None`.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Integer coercion: integer, then float cast, then string parse.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|float| float as i64))
        }
        _ => None,
    }
}

/// Boolean coercion accepting `true|false|1|0|yes|no` and nonzero numbers.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|int| int != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Datetime coercion accepting the legacy `/Date(ms[+tz])/` wrapper and
/// ISO-8601 text; always normalized to UTC.
pub fn coerce_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let text = match value {
        Value::String(text) => text.trim(),
        _ => return None,
    };

    if let Some(millis) = parse_legacy_date(text) {
        return DateTime::from_timestamp_millis(millis);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    // ISO-8601 without an offset is treated as UTC.
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extracts the epoch milliseconds from `/Date(ms)/` or `/Date(ms+hhmm)/`.
fn parse_legacy_date(text: &str) -> Option<i64> {
    let inner = text.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let digits_end = inner
        .char_indices()
        .skip(1)
        .find(|(_, ch)| *ch == '+' || *ch == '-')
        .map(|(index, _)| index)
        .unwrap_or(inner.len());
    inner[..digits_end].parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn coerce_string_converts_scalars() {
        assert_eq!(coerce_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(coerce_string(&json!(42)), Some("42".to_string()));
        assert_eq!(coerce_string(&json!(true)), Some("true".to_string()));
        assert_eq!(coerce_string(&Value::Null), None);
        assert_eq!(coerce_string(&json!({"nested": 1})), None);
    }

    #[test]
    fn coerce_i64_parses_numbers_and_strings() {
        assert_eq!(coerce_i64(&json!(7)), Some(7));
        assert_eq!(coerce_i64(&json!(7.9)), Some(7));
        assert_eq!(coerce_i64(&json!("12")), Some(12));
        assert_eq!(coerce_i64(&json!(" 3.5 ")), Some(3));
        assert_eq!(coerce_i64(&json!("abc")), None);
    }

    #[test]
    fn coerce_bool_accepts_spellings() {
        assert_eq!(coerce_bool(&json!(true)), Some(true));
        assert_eq!(coerce_bool(&json!(1)), Some(true));
        assert_eq!(coerce_bool(&json!(0)), Some(false));
        assert_eq!(coerce_bool(&json!("Yes")), Some(true));
        assert_eq!(coerce_bool(&json!("FALSE")), Some(false));
        assert_eq!(coerce_bool(&json!("maybe")), None);
    }

    #[test]
    fn coerce_datetime_accepts_legacy_wrapper() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let millis = expected.timestamp_millis();
        let wrapped = format!("/Date({millis})/");
        assert_eq!(coerce_datetime(&json!(wrapped)), Some(expected));

        let with_offset = format!("/Date({millis}+0200)/");
        assert_eq!(coerce_datetime(&json!(with_offset)), Some(expected));
    }

    #[test]
    fn coerce_datetime_accepts_iso_8601() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        assert_eq!(
            coerce_datetime(&json!("2024-03-01T12:30:45Z")),
            Some(expected)
        );
        assert_eq!(
            coerce_datetime(&json!("2024-03-01T14:30:45+02:00")),
            Some(expected)
        );
        assert_eq!(
            coerce_datetime(&json!("2024-03-01T12:30:45")),
            Some(expected)
        );
        assert_eq!(coerce_datetime(&json!("not a date")), None);
    }

    #[test]
    fn coerce_datetime_round_trips_rfc3339() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 8, 9, 10).unwrap();
        let text = at.to_rfc3339();
        assert_eq!(coerce_datetime(&json!(text)), Some(at));
    }
}

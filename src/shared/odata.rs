use chrono::{DateTime, SecondsFormat, Utc};

/// Quotes a string literal for an OData filter, doubling embedded quotes.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Formats a UTC instant as an OData `datetime'...'` literal.
pub fn datetime_literal(value: DateTime<Utc>) -> String {
    format!(
        "datetime'{}'",
        value.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

pub fn eq(field: &str, value: &str) -> String {
    format!("{} eq {}", field, string_literal(value))
}

pub fn ge_datetime(field: &str, value: DateTime<Utc>) -> String {
    format!("{} ge {}", field, datetime_literal(value))
}

pub mod connection_pool;
pub mod mirror_store;
pub mod queries;
pub mod rows;
pub mod sqlite_store;


pub use connection_pool::ConnectionPool;
pub use sqlite_store::SqliteStore;

use crate::shared::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 with microseconds so text ordering matches time
/// ordering and round-trips are exact.
pub(crate) fn format_utc(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_utc(text: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| AppError::DeserializationError(format!("invalid stored datetime: {err}")))
}

pub(crate) fn parse_utc_opt(text: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    text.map(parse_utc).transpose()
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const COL_APP_PK: &str = "AppPK";
pub const COL_IS_DELETED: &str = "IsDeleted";
pub const COL_DELETED_AT_UTC: &str = "DeletedAtUtc";
pub const COL_SP_ID: &str = "__sp_id";
pub const COL_SP_MODIFIED_UTC: &str = "__sp_modified_utc";
pub const COL_SP_ETAG: &str = "__sp_etag";

/// Columns owned by the engine; never exposed as user fields.
pub const RESERVED_COLUMNS: [&str; 6] = [
    COL_APP_PK,
    COL_IS_DELETED,
    COL_DELETED_AT_UTC,
    COL_SP_ID,
    COL_SP_MODIFIED_UTC,
    COL_SP_ETAG,
];

pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Server bookkeeping attached to every mirror row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemColumns {
    pub sharepoint_id: Option<i64>,
    pub sharepoint_modified_utc: Option<DateTime<Utc>>,
    pub sharepoint_etag: Option<String>,
    pub is_deleted: bool,
    pub deleted_at_utc: Option<DateTime<Utc>>,
}

/// One locally mirrored row: the application key, whitelisted user fields
/// and the server system columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub app_pk: String,
    pub fields: BTreeMap<String, Value>,
    pub system: SystemColumns,
}

impl MirrorRow {
    pub fn new(app_pk: impl Into<String>) -> Self {
        Self {
            app_pk: app_pk.into(),
            fields: BTreeMap::new(),
            system: SystemColumns::default(),
        }
    }
}

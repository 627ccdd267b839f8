use crate::domain::entities::change_log::ChangeOperation;
use crate::domain::entities::table_config::ConflictPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Append-only audit record for a reconciliation conflict. Both payloads
/// are captured verbatim so operators can replay either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub id: i64,
    pub occurred_utc: DateTime<Utc>,
    pub entity_name: String,
    pub app_pk: String,
    pub change_id: i64,
    pub operation: ChangeOperation,
    pub policy: ConflictPolicy,
    pub sharepoint_id: Option<i64>,
    pub local_etag: Option<String>,
    pub server_etag: Option<String>,
    pub local_payload: Option<Value>,
    pub server_fields: Option<Value>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDraft {
    pub entity_name: String,
    pub app_pk: String,
    pub change_id: i64,
    pub operation: ChangeOperation,
    pub policy: ConflictPolicy,
    pub sharepoint_id: Option<i64>,
    pub local_etag: Option<String>,
    pub server_etag: Option<String>,
    pub local_payload: Option<Value>,
    pub server_fields: Option<Value>,
    pub message: String,
}

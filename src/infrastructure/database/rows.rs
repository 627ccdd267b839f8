//! Raw database row shapes and their conversions into domain entities.

use crate::domain::entities::{
    ChangeLogEntry, ChangeOperation, ChangeStatus, ConflictLogEntry, ConflictPolicy, SyncState,
};
use crate::shared::error::AppError;
use serde_json::Value;
use sqlx::FromRow;

use super::{parse_utc, parse_utc_opt};

#[derive(Debug, Clone, FromRow)]
pub struct ChangeLogRow {
    pub id: i64,
    pub entity_name: String,
    pub app_pk: String,
    pub operation: String,
    pub payload_json: Option<String>,
    pub created_utc: String,
    pub status: String,
    pub attempt_count: i32,
    pub applied_utc: Option<String>,
    pub last_error: Option<String>,
}

impl TryFrom<ChangeLogRow> for ChangeLogEntry {
    type Error = AppError;

    fn try_from(row: ChangeLogRow) -> Result<Self, Self::Error> {
        let operation = ChangeOperation::parse(&row.operation).ok_or_else(|| {
            AppError::DeserializationError(format!("unknown change operation: {}", row.operation))
        })?;
        let status = ChangeStatus::parse(&row.status).ok_or_else(|| {
            AppError::DeserializationError(format!("unknown change status: {}", row.status))
        })?;
        let payload = row
            .payload_json
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;

        Ok(ChangeLogEntry {
            id: row.id,
            entity_name: row.entity_name,
            app_pk: row.app_pk,
            operation,
            payload,
            created_utc: parse_utc(&row.created_utc)?,
            status,
            attempt_count: row.attempt_count,
            applied_utc: parse_utc_opt(row.applied_utc.as_deref())?,
            last_error: row.last_error,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SyncStateRow {
    pub entity_name: String,
    pub last_sync_modified_utc: Option<String>,
    pub last_sync_sp_id: Option<i64>,
    pub last_successful_sync_utc: Option<String>,
    pub last_config_version_applied: Option<i64>,
    pub last_error: Option<String>,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = AppError;

    fn try_from(row: SyncStateRow) -> Result<Self, Self::Error> {
        Ok(SyncState {
            entity_name: row.entity_name,
            last_sync_modified_utc: parse_utc_opt(row.last_sync_modified_utc.as_deref())?,
            last_sync_sp_id: row.last_sync_sp_id,
            last_successful_sync_utc: parse_utc_opt(row.last_successful_sync_utc.as_deref())?,
            last_config_version_applied: row.last_config_version_applied,
            last_error: row.last_error,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ConflictLogRow {
    pub id: i64,
    pub occurred_utc: String,
    pub entity_name: String,
    pub app_pk: String,
    pub change_id: i64,
    pub operation: String,
    pub policy: String,
    pub sharepoint_id: Option<i64>,
    pub local_etag: Option<String>,
    pub server_etag: Option<String>,
    pub local_payload_json: Option<String>,
    pub server_fields_json: Option<String>,
    pub message: String,
}

impl TryFrom<ConflictLogRow> for ConflictLogEntry {
    type Error = AppError;

    fn try_from(row: ConflictLogRow) -> Result<Self, Self::Error> {
        let operation = ChangeOperation::parse(&row.operation).ok_or_else(|| {
            AppError::DeserializationError(format!("unknown change operation: {}", row.operation))
        })?;
        let policy = ConflictPolicy::from_name(&row.policy).ok_or_else(|| {
            AppError::DeserializationError(format!("unknown conflict policy: {}", row.policy))
        })?;
        let parse_payload = |text: Option<&str>| {
            text.map(serde_json::from_str::<Value>)
                .transpose()
                .map_err(|err| AppError::DeserializationError(err.to_string()))
        };

        Ok(ConflictLogEntry {
            id: row.id,
            occurred_utc: parse_utc(&row.occurred_utc)?,
            entity_name: row.entity_name,
            app_pk: row.app_pk,
            change_id: row.change_id,
            operation,
            policy,
            sharepoint_id: row.sharepoint_id,
            local_etag: row.local_etag,
            server_etag: row.server_etag,
            local_payload: parse_payload(row.local_payload_json.as_deref())?,
            server_fields: parse_payload(row.server_fields_json.as_deref())?,
            message: row.message,
        })
    }
}

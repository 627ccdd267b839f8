use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Update,
    SoftDelete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::SoftDelete => "soft_delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(ChangeOperation::Insert),
            "update" => Some(ChangeOperation::Update),
            "soft_delete" => Some(ChangeOperation::SoftDelete),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Pending,
    Applied,
    Conflict,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Conflict => "conflict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ChangeStatus::Pending),
            "applied" => Some(ChangeStatus::Applied),
            "conflict" => Some(ChangeStatus::Conflict),
            _ => None,
        }
    }
}

/// One outbox row. Ids are assigned in insertion order and drained FIFO by
/// (created_utc, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: i64,
    pub entity_name: String,
    pub app_pk: String,
    pub operation: ChangeOperation,
    pub payload: Option<Value>,
    pub created_utc: DateTime<Utc>,
    pub status: ChangeStatus,
    pub attempt_count: i32,
    pub applied_utc: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Insertion request for the outbox; the store assigns id, timestamps and
/// the initial Pending status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDraft {
    pub entity_name: String,
    pub app_pk: String,
    pub operation: ChangeOperation,
    pub payload: Option<Value>,
}

impl ChangeDraft {
    pub fn new(
        entity_name: impl Into<String>,
        app_pk: impl Into<String>,
        operation: ChangeOperation,
        payload: Option<Value>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            app_pk: app_pk.into(),
            operation,
            payload,
        }
    }
}

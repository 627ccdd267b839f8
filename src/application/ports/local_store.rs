use crate::domain::entities::{
    AppTableConfig, ChangeDraft, ChangeLogEntry, ConflictDraft, ConflictLogEntry, LocalConfig,
    MirrorRow, SyncState, SystemColumns,
};
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Durable storage for configuration, sync state, the outbox and the
/// conflict log. Kept separate from [`MirrorStore`] so the engine depends
/// on two narrow contracts rather than one wide backend type.
#[async_trait]
pub trait CoreStore: Send + Sync {
    /// Creates core tables and indexes; safe to call repeatedly.
    async fn initialize_schema(&self) -> Result<()>;

    async fn load_config(&self, app_id: &str) -> Result<Option<LocalConfig>>;

    /// Replaces the local configuration snapshot in a single write.
    async fn save_config(&self, config: &LocalConfig) -> Result<()>;

    async fn sync_state(&self, entity_name: &str) -> Result<Option<SyncState>>;

    async fn save_sync_state(&self, state: &SyncState) -> Result<()>;

    /// Appends an outbox row with Pending status; returns the assigned id.
    async fn enqueue_change(&self, draft: ChangeDraft) -> Result<i64>;

    /// Pending rows in ascending (created_utc, id) order.
    async fn pending_changes(&self, limit: u32) -> Result<Vec<ChangeLogEntry>>;

    async fn mark_change_applied(&self, id: i64, applied_utc: DateTime<Utc>) -> Result<()>;

    /// Records the failure and bumps the attempt count; the row stays
    /// Pending and is retried on the next drain.
    async fn mark_change_failed(&self, id: i64, error: &str) -> Result<()>;

    /// Terminal until an operator resets the row.
    async fn mark_change_conflicted(&self, id: i64, error: &str) -> Result<()>;

    /// Operator action: returns a row to Pending with audit columns cleared.
    async fn reset_change_to_pending(&self, id: i64) -> Result<()>;

    async fn log_conflict(&self, draft: ConflictDraft) -> Result<i64>;

    /// Most recent conflicts by (occurred_utc, id) descending.
    async fn recent_conflicts(&self, limit: u32) -> Result<Vec<ConflictLogEntry>>;
}

/// Per-entity mirror row storage.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Creates the mirror table if absent and adds columns for new
    /// whitelisted fields. Additive only; never drops or retypes columns.
    async fn ensure_entity_schema(&self, table: &AppTableConfig) -> Result<()>;

    /// Replaces the whole mirror row identified by `app_pk`. Reserved keys
    /// are filtered from `fields` before writing.
    async fn upsert_row(
        &self,
        entity_name: &str,
        app_pk: &str,
        fields: &BTreeMap<String, Value>,
        system: &SystemColumns,
    ) -> Result<()>;

    async fn get_row(&self, entity_name: &str, app_pk: &str) -> Result<Option<MirrorRow>>;
}

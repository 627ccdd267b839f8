use crate::application::ports::local_store::CoreStore;
use crate::domain::entities::{
    ChangeDraft, ChangeLogEntry, ConflictDraft, ConflictLogEntry, LocalConfig, SyncState,
};
use crate::shared::config::DatabaseConfig;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::connection_pool::ConnectionPool;
use super::queries;
use super::rows::{ChangeLogRow, ConflictLogRow, SyncStateRow};
use super::{format_utc, parse_utc};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// SQLite backend implementing both store contracts over one pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub async fn open(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = ConnectionPool::new(database_url, max_connections).await?;
        Ok(Self::new(pool))
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open(&config.url, config.max_connections).await
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::from_memory().await?;
        Ok(Self::new(pool))
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }
}

#[async_trait]
impl CoreStore for SqliteStore {
    async fn initialize_schema(&self) -> Result<()> {
        MIGRATOR.run(self.pool()).await?;
        Ok(())
    }

    async fn load_config(&self, app_id: &str) -> Result<Option<LocalConfig>> {
        let row = sqlx::query_as::<_, (String, i64, String, String)>(queries::SELECT_LOCAL_CONFIG)
            .bind(app_id)
            .fetch_optional(self.pool())
            .await?;

        let Some((app_id, config_version, tables_json, updated_utc)) = row else {
            return Ok(None);
        };

        let tables = serde_json::from_str(&tables_json)
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;

        Ok(Some(LocalConfig {
            app_id,
            config_version,
            tables,
            updated_utc: parse_utc(&updated_utc)?,
        }))
    }

    async fn save_config(&self, config: &LocalConfig) -> Result<()> {
        let tables_json = serde_json::to_string(&config.tables)?;

        sqlx::query(queries::UPSERT_LOCAL_CONFIG)
            .bind(&config.app_id)
            .bind(config.config_version)
            .bind(&tables_json)
            .bind(format_utc(config.updated_utc))
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn sync_state(&self, entity_name: &str) -> Result<Option<SyncState>> {
        let row = sqlx::query_as::<_, SyncStateRow>(queries::SELECT_SYNC_STATE)
            .bind(entity_name)
            .fetch_optional(self.pool())
            .await?;

        row.map(SyncState::try_from).transpose()
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(queries::UPSERT_SYNC_STATE)
            .bind(&state.entity_name)
            .bind(state.last_sync_modified_utc.map(format_utc))
            .bind(state.last_sync_sp_id)
            .bind(state.last_successful_sync_utc.map(format_utc))
            .bind(state.last_config_version_applied)
            .bind(&state.last_error)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn enqueue_change(&self, draft: ChangeDraft) -> Result<i64> {
        let payload_json = draft
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(queries::INSERT_CHANGE)
            .bind(&draft.entity_name)
            .bind(&draft.app_pk)
            .bind(draft.operation.as_str())
            .bind(&payload_json)
            .bind(format_utc(Utc::now()))
            .execute(self.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn pending_changes(&self, limit: u32) -> Result<Vec<ChangeLogEntry>> {
        let rows = sqlx::query_as::<_, ChangeLogRow>(queries::SELECT_PENDING_CHANGES)
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(ChangeLogEntry::try_from).collect()
    }

    async fn mark_change_applied(&self, id: i64, applied_utc: DateTime<Utc>) -> Result<()> {
        sqlx::query(queries::MARK_CHANGE_APPLIED)
            .bind(format_utc(applied_utc))
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn mark_change_failed(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query(queries::MARK_CHANGE_FAILED)
            .bind(error)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn mark_change_conflicted(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query(queries::MARK_CHANGE_CONFLICTED)
            .bind(error)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn reset_change_to_pending(&self, id: i64) -> Result<()> {
        sqlx::query(queries::RESET_CHANGE_TO_PENDING)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn log_conflict(&self, draft: ConflictDraft) -> Result<i64> {
        let local_payload_json = draft
            .local_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let server_fields_json = draft
            .server_fields
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(queries::INSERT_CONFLICT)
            .bind(format_utc(Utc::now()))
            .bind(&draft.entity_name)
            .bind(&draft.app_pk)
            .bind(draft.change_id)
            .bind(draft.operation.as_str())
            .bind(draft.policy.as_str())
            .bind(draft.sharepoint_id)
            .bind(&draft.local_etag)
            .bind(&draft.server_etag)
            .bind(&local_payload_json)
            .bind(&server_fields_json)
            .bind(&draft.message)
            .execute(self.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_conflicts(&self, limit: u32) -> Result<Vec<ConflictLogEntry>> {
        let rows = sqlx::query_as::<_, ConflictLogRow>(queries::SELECT_RECENT_CONFLICTS)
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(ConflictLogEntry::try_from).collect()
    }
}

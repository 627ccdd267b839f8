use crate::application::ports::local_store::{CoreStore, MirrorStore};
use crate::application::ports::remote_connector::RemoteConnector;
use crate::application::services::{ConfigurationService, SyncEngine, TableLocks};
use crate::application::services::{PullReport, PushReport};
use crate::domain::entities::mirror;
use crate::domain::entities::{
    AppTableConfig, ChangeDraft, ChangeLogEntry, ChangeOperation, ConflictLogEntry, LocalConfig,
    MirrorRow, SyncPolicy, SystemColumns,
};
use crate::shared::config::SyncOptions;
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lock key reserved for outbox drains. Control characters cannot collide
/// with server entity names.
const OUTBOX_LOCK_KEY: &str = "\u{1}outbox";

/// Combined result of a composite sync (drain, then pulls).
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub push: PushReport,
    pub pulls: Vec<PullReport>,
}

/// Thread-safe facade binding the local store, the remote connector, the
/// configuration manager and the sync engine behind one lifecycle. All
/// reads and writes stay local; server reconciliation happens in the sync
/// entry points.
pub struct SyncClient<S>
where
    S: CoreStore + MirrorStore + 'static,
{
    app_id: String,
    store: Arc<S>,
    engine: SyncEngine<S>,
    config_service: ConfigurationService<S>,
    active_config: RwLock<Option<LocalConfig>>,
    locks: TableLocks,
}

impl<S> SyncClient<S>
where
    S: CoreStore + MirrorStore + 'static,
{
    pub fn new(
        app_id: impl Into<String>,
        store: Arc<S>,
        remote: Arc<dyn RemoteConnector>,
        options: SyncOptions,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            engine: SyncEngine::new(Arc::clone(&store), Arc::clone(&remote), options),
            config_service: ConfigurationService::new(Arc::clone(&store), remote),
            store,
            active_config: RwLock::new(None),
            locks: TableLocks::new(),
        }
    }

    /// Opens the store schema and runs configuration discovery once.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<LocalConfig> {
        self.store.initialize_schema().await?;
        self.ensure_config(cancel).await
    }

    /// Refreshes the table catalog when the server has a newer version and
    /// makes sure every configured mirror table exists.
    pub async fn ensure_config(&self, cancel: &CancellationToken) -> Result<LocalConfig> {
        let config = self.config_service.ensure_config(&self.app_id, cancel).await?;
        for table in &config.tables {
            self.store.ensure_entity_schema(table).await?;
        }
        *self.active_config.write().await = Some(config.clone());
        Ok(config)
    }

    async fn active_config(&self) -> Result<LocalConfig> {
        if let Some(config) = self.active_config.read().await.as_ref() {
            return Ok(config.clone());
        }
        // Fall back to the persisted snapshot for clients that were
        // initialized in an earlier session.
        if let Some(config) = self.store.load_config(&self.app_id).await? {
            *self.active_config.write().await = Some(config.clone());
            return Ok(config);
        }
        Err(AppError::ConfigurationError(format!(
            "no table configuration for app '{}'; call initialize or ensure_config first",
            self.app_id
        )))
    }

    fn table_config(config: &LocalConfig, entity_name: &str) -> Result<AppTableConfig> {
        config.table(entity_name).cloned().ok_or_else(|| {
            AppError::ConfigurationError(format!(
                "entity '{entity_name}' is not part of the configured table catalog"
            ))
        })
    }

    /// Drains the outbox, then pulls every OnOpen table in priority order.
    pub async fn sync_on_open(&self, cancel: &CancellationToken) -> Result<SyncSummary> {
        let config = self.active_config().await?;
        let push = self.drain_outbox(&config, cancel).await?;
        let mut pulls = Vec::new();
        for table in config.tables_for_policy(SyncPolicy::OnOpen) {
            pulls.push(self.pull_guarded(&config, table, cancel).await?);
        }
        Ok(SyncSummary { push, pulls })
    }

    /// Drains the outbox, then pulls every enabled table in priority order.
    pub async fn sync_all(&self, cancel: &CancellationToken) -> Result<SyncSummary> {
        let config = self.active_config().await?;
        let push = self.drain_outbox(&config, cancel).await?;
        let mut pulls = Vec::new();
        for table in config.enabled_tables() {
            pulls.push(self.pull_guarded(&config, table, cancel).await?);
        }
        Ok(SyncSummary { push, pulls })
    }

    /// Drains the outbox, then pulls one entity under its table lock.
    pub async fn sync_table(
        &self,
        entity_name: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        require_non_empty(entity_name, "entity name")?;
        let config = self.active_config().await?;
        let table = Self::table_config(&config, entity_name)?;

        let push = self.drain_outbox(&config, cancel).await?;
        let pull = self.pull_guarded(&config, &table, cancel).await?;
        Ok(SyncSummary {
            push,
            pulls: vec![pull],
        })
    }

    async fn drain_outbox(
        &self,
        config: &LocalConfig,
        cancel: &CancellationToken,
    ) -> Result<PushReport> {
        let _guard = self.locks.acquire(OUTBOX_LOCK_KEY).await?;
        self.engine.sync_up(config, cancel).await
    }

    async fn pull_guarded(
        &self,
        config: &LocalConfig,
        table: &AppTableConfig,
        cancel: &CancellationToken,
    ) -> Result<PullReport> {
        let _guard = self.locks.acquire(&table.entity_name).await?;
        self.engine.sync_down(config, table, cancel).await
    }

    /// Writes the payload into the mirror and enqueues an Insert.
    pub async fn upsert_local_and_enqueue_insert(
        &self,
        entity_name: &str,
        app_pk: &str,
        payload: Map<String, Value>,
    ) -> Result<i64> {
        self.upsert_local_and_enqueue(entity_name, app_pk, payload, ChangeOperation::Insert)
            .await
    }

    /// Writes the payload into the mirror and enqueues an Update.
    pub async fn upsert_local_and_enqueue_update(
        &self,
        entity_name: &str,
        app_pk: &str,
        payload: Map<String, Value>,
    ) -> Result<i64> {
        self.upsert_local_and_enqueue(entity_name, app_pk, payload, ChangeOperation::Update)
            .await
    }

    async fn upsert_local_and_enqueue(
        &self,
        entity_name: &str,
        app_pk: &str,
        payload: Map<String, Value>,
        operation: ChangeOperation,
    ) -> Result<i64> {
        require_non_empty(entity_name, "entity name")?;
        require_non_empty(app_pk, "AppPK")?;

        let config = self.active_config().await?;
        let table = Self::table_config(&config, entity_name)?;
        self.store.ensure_entity_schema(&table).await?;

        let outbox_payload = sanitize_payload(&payload, &table.pk_internal_name);
        let patch = mirror_patch(&outbox_payload, &table);

        // Existing fields and system columns survive unless overwritten.
        let existing = self.store.get_row(entity_name, app_pk).await?;
        let (mut fields, system) = existing
            .map(|row| (row.fields, row.system))
            .unwrap_or_else(|| (BTreeMap::new(), SystemColumns::default()));
        for (name, value) in patch {
            fields.insert(name, value);
        }
        self.store
            .upsert_row(entity_name, app_pk, &fields, &system)
            .await?;

        let change_id = self
            .store
            .enqueue_change(ChangeDraft::new(
                entity_name,
                app_pk,
                operation,
                Some(Value::Object(outbox_payload)),
            ))
            .await?;

        debug!(
            entity = entity_name,
            app_pk,
            change_id,
            operation = operation.as_str(),
            "local write enqueued"
        );
        Ok(change_id)
    }

    /// Sets the local tombstone and enqueues a SoftDelete.
    pub async fn mark_local_deleted_and_enqueue_soft_delete(
        &self,
        entity_name: &str,
        app_pk: &str,
    ) -> Result<i64> {
        require_non_empty(entity_name, "entity name")?;
        require_non_empty(app_pk, "AppPK")?;

        let config = self.active_config().await?;
        let table = Self::table_config(&config, entity_name)?;
        self.store.ensure_entity_schema(&table).await?;

        let Some(row) = self.store.get_row(entity_name, app_pk).await? else {
            return Err(AppError::NotFound(format!(
                "no local row '{app_pk}' in entity '{entity_name}'"
            )));
        };

        let system = SystemColumns {
            is_deleted: true,
            deleted_at_utc: Some(Utc::now()),
            ..row.system
        };
        self.store
            .upsert_row(entity_name, app_pk, &row.fields, &system)
            .await?;

        self.store
            .enqueue_change(ChangeDraft::new(
                entity_name,
                app_pk,
                ChangeOperation::SoftDelete,
                None,
            ))
            .await
    }

    /// Reads one mirror row.
    pub async fn get_local(&self, entity_name: &str, app_pk: &str) -> Result<Option<MirrorRow>> {
        require_non_empty(entity_name, "entity name")?;
        require_non_empty(app_pk, "AppPK")?;

        let config = self.active_config().await?;
        let table = Self::table_config(&config, entity_name)?;
        self.store.ensure_entity_schema(&table).await?;
        self.store.get_row(entity_name, app_pk).await
    }

    pub async fn pending_changes(&self, limit: u32) -> Result<Vec<ChangeLogEntry>> {
        self.store.pending_changes(limit).await
    }

    pub async fn recent_conflicts(&self, limit: u32) -> Result<Vec<ConflictLogEntry>> {
        self.store.recent_conflicts(limit).await
    }

    /// Operator action: returns a conflicted change to the drain.
    pub async fn retry_conflict(&self, change_id: i64) -> Result<()> {
        self.store.reset_change_to_pending(change_id).await
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{what} is empty")));
    }
    Ok(())
}

/// Strips reserved system keys and the entity's primary-key column from a
/// user payload. The engine re-injects the key under `pk_internal_name`
/// when it pushes.
pub(crate) fn sanitize_payload(
    payload: &Map<String, Value>,
    pk_internal_name: &str,
) -> Map<String, Value> {
    payload
        .iter()
        .filter(|(name, _)| {
            !mirror::is_reserved_column(name) && !name.eq_ignore_ascii_case(pk_internal_name)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Restricts a sanitized payload to the entity's field whitelist for the
/// mirror write.
pub(crate) fn mirror_patch(
    sanitized: &Map<String, Value>,
    table: &AppTableConfig,
) -> BTreeMap<String, Value> {
    sanitized
        .iter()
        .filter(|(name, _)| table.select_fields.iter().any(|field| field == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

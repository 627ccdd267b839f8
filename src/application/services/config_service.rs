use crate::application::ports::local_store::CoreStore;
use crate::application::ports::remote_connector::{
    ListQuery, RemoteConnector, RemoteError, RemoteItem,
};
use crate::domain::coerce;
use crate::domain::entities::table_config::DEFAULT_PK_INTERNAL_NAME;
use crate::domain::entities::{
    AppTableConfig, AttachmentsMode, ConflictPolicy, LocalConfig, PartitionStrategy, SyncPolicy,
};
use crate::shared::error::{AppError, Result};
use crate::shared::odata;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CONFIG_LIST_TITLE: &str = "APP_Config";
const TABLES_LIST_TITLE: &str = "APP_Tables";
const TABLES_PAGE_SIZE: u32 = 100;

/// Discovers what to sync. Refreshes the local table catalog only when the
/// server advertises a strictly newer ConfigVersion.
pub struct ConfigurationService<S: CoreStore> {
    store: Arc<S>,
    remote: Arc<dyn RemoteConnector>,
}

impl<S: CoreStore> ConfigurationService<S> {
    pub fn new(store: Arc<S>, remote: Arc<dyn RemoteConnector>) -> Self {
        Self { store, remote }
    }

    pub async fn ensure_config(
        &self,
        app_id: &str,
        cancel: &CancellationToken,
    ) -> Result<LocalConfig> {
        if app_id.trim().is_empty() {
            return Err(AppError::InvalidInput("app id is empty".to_string()));
        }

        let local = self
            .store
            .load_config(app_id)
            .await?
            .unwrap_or_else(|| LocalConfig::empty(app_id));

        let config_list = self.remote.list_id_by_title(CONFIG_LIST_TITLE).await?;
        let query = ListQuery {
            select: vec![
                "AppId".to_string(),
                "ConfigVersion".to_string(),
                "MinClientVersion".to_string(),
                "LastModifiedUtc".to_string(),
            ],
            filter: Some(odata::eq("AppId", app_id)),
            top: Some(1),
            ..ListQuery::default()
        };
        let page = self.remote.query_list_items(config_list, &query).await?;

        let Some(remote_row) = page.items.first() else {
            debug!(app_id, "no remote config row, keeping local catalog");
            return Ok(local);
        };

        let remote_version = remote_row
            .fields
            .get("ConfigVersion")
            .and_then(coerce::coerce_i64)
            .unwrap_or(0);

        if remote_version <= local.config_version {
            debug!(
                app_id,
                local_version = local.config_version,
                remote_version,
                "local config is current"
            );
            return Ok(local);
        }

        let tables = self.fetch_tables(cancel).await?;
        let refreshed = LocalConfig {
            app_id: app_id.to_string(),
            config_version: remote_version,
            tables,
            updated_utc: Utc::now(),
        };
        self.store.save_config(&refreshed).await?;

        info!(
            app_id,
            config_version = refreshed.config_version,
            tables = refreshed.tables.len(),
            "refreshed table catalog"
        );
        Ok(refreshed)
    }

    async fn fetch_tables(&self, cancel: &CancellationToken) -> Result<Vec<AppTableConfig>> {
        let tables_list = self.remote.list_id_by_title(TABLES_LIST_TITLE).await?;

        let mut include_conflict_policy = true;
        let mut cursor: Option<String> = None;
        let mut tables = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let query = ListQuery {
                select: tables_select(include_conflict_policy),
                order_by: Some("Priority asc".to_string()),
                top: Some(TABLES_PAGE_SIZE),
                page_cursor: cursor.clone(),
                ..ListQuery::default()
            };

            let page = match self.remote.query_list_items(tables_list, &query).await {
                Ok(page) => page,
                Err(err) if include_conflict_policy && cites_conflict_policy(&err) => {
                    // Older deployments predate the ConflictPolicy column;
                    // restart the pull without it and let rows default to
                    // ServerWins.
                    warn!("table catalog has no ConflictPolicy column, retrying without it");
                    include_conflict_policy = false;
                    cursor = None;
                    tables.clear();
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            for item in &page.items {
                if let Some(table) = parse_table_row(item) {
                    tables.push(table);
                }
            }

            match page.next_page_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(tables)
    }
}

fn tables_select(include_conflict_policy: bool) -> Vec<String> {
    let mut select: Vec<String> = [
        "EntityName",
        "ListId",
        "ListTitle",
        "Enabled",
        "PkInternalName",
        "SelectFieldsJson",
        "SyncPolicy",
        "Priority",
        "AttachmentsMode",
        "PartitionStrategy",
        "ExpectedIndexesJson",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    if include_conflict_policy {
        select.push("ConflictPolicy".to_string());
    }
    select
}

fn cites_conflict_policy(err: &RemoteError) -> bool {
    matches!(
        err,
        RemoteError::Request { status: 400, body, .. }
            if body.to_ascii_lowercase().contains("conflictpolicy")
    )
}

pub(crate) fn parse_table_row(item: &RemoteItem) -> Option<AppTableConfig> {
    let field = |name: &str| item.fields.get(name).unwrap_or(&Value::Null);

    let Some(entity_name) = coerce::coerce_string(field("EntityName"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
    else {
        warn!(item_id = item.id, "table row without EntityName, skipping");
        return None;
    };

    let Some(list_id) = coerce::coerce_string(field("ListId"))
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    else {
        warn!(entity = %entity_name, "table row without a valid ListId, skipping");
        return None;
    };

    let list_title = coerce::coerce_string(field("ListTitle"))
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| entity_name.clone());
    let pk_internal_name = coerce::coerce_string(field("PkInternalName"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PK_INTERNAL_NAME.to_string());

    Some(AppTableConfig {
        entity_name,
        list_id,
        list_title,
        enabled: coerce::coerce_bool(field("Enabled")).unwrap_or(false),
        pk_internal_name,
        select_fields: parse_string_list(field("SelectFieldsJson")),
        sync_policy: SyncPolicy::from_value(field("SyncPolicy")).unwrap_or_default(),
        priority: field_i32(field("Priority")),
        attachments_mode: AttachmentsMode::from_value(field("AttachmentsMode")).unwrap_or_default(),
        partition_strategy: PartitionStrategy::from_value(field("PartitionStrategy"))
            .unwrap_or_default(),
        conflict_policy: ConflictPolicy::from_value(field("ConflictPolicy")).unwrap_or_default(),
        expected_indexes: parse_string_list(field("ExpectedIndexesJson")),
    })
}

fn field_i32(value: &Value) -> i32 {
    coerce::coerce_i64(value).unwrap_or(0) as i32
}

fn parse_string_list(value: &Value) -> Vec<String> {
    coerce::coerce_string(value)
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default()
}

use crate::application::ports::local_store::{CoreStore, MirrorStore};
use crate::application::ports::remote_connector::{ListQuery, RemoteItem};
use crate::domain::coerce;
use crate::domain::entities::mirror::{self, COL_DELETED_AT_UTC, COL_IS_DELETED, SystemColumns};
use crate::domain::entities::{AppTableConfig, LocalConfig, SyncPolicy, SyncState, Watermark};
use crate::shared::error::Result;
use crate::shared::odata;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SyncEngine;

#[derive(Debug, Clone)]
pub struct PullReport {
    pub entity_name: String,
    pub rows_applied: usize,
}

/// Columns every pull asks for on top of the user whitelist.
pub(crate) fn pull_select(table: &AppTableConfig) -> Vec<String> {
    let mut select = table.select_fields.clone();
    for extra in [
        table.pk_internal_name.as_str(),
        COL_IS_DELETED,
        COL_DELETED_AT_UTC,
        "Id",
        "Modified",
    ] {
        if !select.iter().any(|name| name == extra) {
            select.push(extra.to_string());
        }
    }
    select
}

impl<S> SyncEngine<S>
where
    S: CoreStore + MirrorStore,
{
    /// Incremental pull for one table. Failures are recorded into the
    /// table's SyncState before propagating.
    pub async fn sync_down(
        &self,
        config: &LocalConfig,
        table: &AppTableConfig,
        cancel: &CancellationToken,
    ) -> Result<PullReport> {
        match self.pull_table(config, table, cancel).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if !matches!(err, crate::shared::error::AppError::Cancelled) {
                    self.record_pull_error(&table.entity_name, &err).await;
                }
                Err(err)
            }
        }
    }

    async fn pull_table(
        &self,
        config: &LocalConfig,
        table: &AppTableConfig,
        cancel: &CancellationToken,
    ) -> Result<PullReport> {
        self.store().ensure_entity_schema(table).await?;

        let mut state = self
            .store()
            .sync_state(&table.entity_name)
            .await?
            .unwrap_or_else(|| SyncState::empty(&table.entity_name));

        // The overlap re-reads the skew window around the watermark; the
        // upsert is keyed by AppPK, so replays are idempotent.
        let filter = state.last_sync_modified_utc.map(|last| {
            odata::ge_datetime(
                "Modified",
                last - Duration::minutes(self.options.pull_overlap_minutes),
            )
        });

        let select = pull_select(table);
        let mut cursor: Option<String> = None;
        let mut rows_applied = 0usize;
        let mut max_seen: Option<Watermark> = None;

        loop {
            Self::ensure_not_cancelled(cancel)?;

            let query = ListQuery {
                select: select.clone(),
                filter: filter.clone(),
                order_by: Some("Modified asc, Id asc".to_string()),
                top: Some(self.options.page_size),
                page_cursor: cursor.clone(),
            };
            let page = self.remote.query_list_items(table.list_id, &query).await?;
            let page_len = page.items.len();

            for item in &page.items {
                Self::ensure_not_cancelled(cancel)?;
                if self.apply_remote_item(table, item).await? {
                    rows_applied += 1;
                }
                let mark = Watermark::new(item.modified_utc, item.id);
                max_seen = Some(max_seen.map_or(mark, |seen| seen.max(mark)));
            }

            debug!(entity = %table.entity_name, rows = page_len, "pulled page");

            match page.next_page_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if let Some(mark) = max_seen {
            state.advance_watermark(mark);
        }
        state.last_successful_sync_utc = Some(Utc::now());
        state.last_config_version_applied = Some(config.config_version);
        state.last_error = None;
        self.store().save_sync_state(&state).await?;

        info!(entity = %table.entity_name, rows = rows_applied, "pull complete");
        Ok(PullReport {
            entity_name: table.entity_name.clone(),
            rows_applied,
        })
    }

    /// Pulls all enabled OnOpen tables sequentially in priority order.
    pub async fn sync_down_on_open(
        &self,
        config: &LocalConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullReport>> {
        let mut reports = Vec::new();
        for table in config.tables_for_policy(SyncPolicy::OnOpen) {
            Self::ensure_not_cancelled(cancel)?;
            reports.push(self.sync_down(config, table, cancel).await?);
        }
        Ok(reports)
    }

    /// Pulls all enabled tables sequentially in priority order.
    pub async fn sync_down_enabled(
        &self,
        config: &LocalConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullReport>> {
        let mut reports = Vec::new();
        for table in config.enabled_tables() {
            Self::ensure_not_cancelled(cancel)?;
            reports.push(self.sync_down(config, table, cancel).await?);
        }
        Ok(reports)
    }

    /// Writes one server item into the mirror. Returns false when the item
    /// carries no usable application key.
    pub(crate) async fn apply_remote_item(
        &self,
        table: &AppTableConfig,
        item: &RemoteItem,
    ) -> Result<bool> {
        let app_pk = item
            .fields
            .get(&table.pk_internal_name)
            .and_then(coerce::coerce_string)
            .map(|pk| pk.trim().to_string())
            .filter(|pk| !pk.is_empty());
        let Some(app_pk) = app_pk else {
            warn!(
                entity = %table.entity_name,
                item_id = item.id,
                "server item without application key, skipping"
            );
            return Ok(false);
        };

        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        for name in &table.select_fields {
            if name.eq_ignore_ascii_case(&table.pk_internal_name)
                || mirror::is_reserved_column(name)
            {
                continue;
            }
            if let Some(value) = item.fields.get(name) {
                if !value.is_null() {
                    fields.insert(name.clone(), value.clone());
                }
            }
        }

        let is_deleted = item
            .fields
            .get(COL_IS_DELETED)
            .and_then(coerce::coerce_bool)
            .unwrap_or(false);
        let deleted_at_utc = item
            .fields
            .get(COL_DELETED_AT_UTC)
            .and_then(coerce::coerce_datetime);
        let system = SystemColumns {
            sharepoint_id: Some(item.id),
            sharepoint_modified_utc: Some(item.modified_utc),
            sharepoint_etag: item.etag.clone(),
            is_deleted,
            // A tombstone always carries a deletion time locally.
            deleted_at_utc: if is_deleted {
                deleted_at_utc.or(Some(item.modified_utc))
            } else {
                deleted_at_utc
            },
        };

        self.store()
            .upsert_row(&table.entity_name, &app_pk, &fields, &system)
            .await?;
        Ok(true)
    }

    async fn record_pull_error(&self, entity_name: &str, err: &crate::shared::error::AppError) {
        let mut state = match self.store().sync_state(entity_name).await {
            Ok(Some(state)) => state,
            Ok(None) => SyncState::empty(entity_name),
            Err(store_err) => {
                tracing::error!(entity = entity_name, error = %store_err, "failed to load sync state for error recording");
                return;
            }
        };
        state.last_error = Some(err.to_string());
        if let Err(store_err) = self.store().save_sync_state(&state).await {
            tracing::error!(entity = entity_name, error = %store_err, "failed to record pull error");
        }
    }
}

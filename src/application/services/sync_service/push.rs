use crate::application::ports::local_store::{CoreStore, MirrorStore};
use crate::application::ports::remote_connector::{ListQuery, RemoteItem, IF_MATCH_ANY};
use crate::domain::entities::mirror::{COL_DELETED_AT_UTC, COL_IS_DELETED};
use crate::domain::entities::{AppTableConfig, ChangeLogEntry, ChangeOperation, LocalConfig};
use crate::shared::error::{AppError, Result};
use crate::shared::odata;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pull::pull_select;
use super::SyncEngine;

#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub applied: u32,
    pub failed: u32,
    pub conflicted: u32,
}

/// Outcome of pushing a single outbox row.
pub(crate) enum PushOutcome {
    Applied,
    /// Terminal; the resolver already marked the row.
    Conflicted,
    /// Transient; the row stays Pending with the given error recorded.
    Failed(String),
}

pub(crate) fn tombstone_payload(
    table: &AppTableConfig,
    app_pk: &str,
    deleted_at: DateTime<Utc>,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(table.pk_internal_name.clone(), json!(app_pk));
    payload.insert(COL_IS_DELETED.to_string(), json!(true));
    payload.insert(
        COL_DELETED_AT_UTC.to_string(),
        json!(deleted_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    payload
}

impl<S> SyncEngine<S>
where
    S: CoreStore + MirrorStore,
{
    /// Drains up to `max_changes_per_drain` pending outbox rows in FIFO
    /// order. Rows that fail transiently stay Pending for the next drain.
    pub async fn sync_up(
        &self,
        config: &LocalConfig,
        cancel: &CancellationToken,
    ) -> Result<PushReport> {
        let pending = self
            .store()
            .pending_changes(self.options.max_changes_per_drain)
            .await?;
        let mut report = PushReport::default();

        for entry in pending {
            Self::ensure_not_cancelled(cancel)?;

            let Some(table) = config.table(&entry.entity_name) else {
                self.store()
                    .mark_change_failed(entry.id, "Unknown entity/table")
                    .await?;
                report.failed += 1;
                continue;
            };

            match self.push_change(table, &entry).await {
                Ok(PushOutcome::Applied) => {
                    self.store()
                        .mark_change_applied(entry.id, Utc::now())
                        .await?;
                    report.applied += 1;
                }
                Ok(PushOutcome::Conflicted) => {
                    report.conflicted += 1;
                }
                Ok(PushOutcome::Failed(message)) => {
                    debug!(change_id = entry.id, error = %message, "change push failed");
                    self.store().mark_change_failed(entry.id, &message).await?;
                    report.failed += 1;
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(err) => {
                    self.store()
                        .mark_change_failed(entry.id, &err.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            applied = report.applied,
            failed = report.failed,
            conflicted = report.conflicted,
            "outbox drain complete"
        );
        Ok(report)
    }

    async fn push_change(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
    ) -> Result<PushOutcome> {
        self.store().ensure_entity_schema(table).await?;

        match entry.operation {
            ChangeOperation::Insert => self.push_insert(table, entry).await,
            ChangeOperation::Update => match payload_object(entry) {
                Some(payload) => self.push_mutation(table, entry, payload).await,
                None => Ok(PushOutcome::Failed(
                    "update change has no payload".to_string(),
                )),
            },
            ChangeOperation::SoftDelete => {
                let payload = tombstone_payload(table, &entry.app_pk, Utc::now());
                self.push_mutation(table, entry, payload).await
            }
        }
    }

    async fn push_insert(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
    ) -> Result<PushOutcome> {
        let Some(mut fields) = payload_object(entry) else {
            return Ok(PushOutcome::Failed(
                "insert change has no payload".to_string(),
            ));
        };
        fields.insert(table.pk_internal_name.clone(), json!(entry.app_pk));
        if !fields.contains_key("Title") {
            fields.insert("Title".to_string(), json!(entry.app_pk));
        }

        match self.remote.create_list_item(table.list_id, &fields).await {
            Ok(new_id) => {
                // Merge the assigned server id into the mirror row before
                // the best-effort refresh, so the id survives even if the
                // refresh fetch fails.
                let existing = self
                    .store()
                    .get_row(&table.entity_name, &entry.app_pk)
                    .await?;
                let (row_fields, mut system) = existing
                    .map(|row| (row.fields, row.system))
                    .unwrap_or_default();
                system.sharepoint_id = Some(new_id);
                self.store()
                    .upsert_row(&table.entity_name, &entry.app_pk, &row_fields, &system)
                    .await?;

                self.refresh_mirror(table, new_id).await;
                Ok(PushOutcome::Applied)
            }
            Err(err) if err.is_already_exists() => {
                match self.find_item_by_pk(table, &entry.app_pk).await? {
                    Some(server_item) => {
                        self.resolve_insert_exists(table, entry, &fields, &server_item)
                            .await
                    }
                    None => Ok(PushOutcome::Failed(format!(
                        "create reported an existing item, but none found by key: {err}"
                    ))),
                }
            }
            Err(err) => Ok(PushOutcome::Failed(err.to_string())),
        }
    }

    /// Shared path for Update and SoftDelete: resolve the server item id,
    /// write with the local ETag, fall into conflict resolution on 409/412.
    async fn push_mutation(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
        payload: Map<String, Value>,
    ) -> Result<PushOutcome> {
        let mirror_row = self
            .store()
            .get_row(&table.entity_name, &entry.app_pk)
            .await?;

        let mut item_id = mirror_row
            .as_ref()
            .and_then(|row| row.system.sharepoint_id);
        if item_id.is_none() {
            item_id = self
                .find_item_by_pk(table, &entry.app_pk)
                .await?
                .map(|item| item.id);
        }
        let Some(item_id) = item_id else {
            return Ok(PushOutcome::Failed(format!(
                "no server item found for key '{}'",
                entry.app_pk
            )));
        };

        let local_etag = mirror_row
            .as_ref()
            .and_then(|row| row.system.sharepoint_etag.clone());
        let if_match = local_etag.as_deref().unwrap_or(IF_MATCH_ANY);

        match self
            .remote
            .update_list_item(table.list_id, item_id, &payload, if_match)
            .await
        {
            Ok(()) => {
                self.refresh_mirror(table, item_id).await;
                Ok(PushOutcome::Applied)
            }
            Err(err) if err.is_concurrency_conflict() => {
                let server_item = self
                    .remote
                    .get_list_item(table.list_id, item_id, &pull_select(table))
                    .await?;
                self.resolve_concurrency_conflict(table, entry, &payload, local_etag, &server_item)
                    .await
            }
            Err(err) => Ok(PushOutcome::Failed(err.to_string())),
        }
    }

    pub(crate) async fn find_item_by_pk(
        &self,
        table: &AppTableConfig,
        app_pk: &str,
    ) -> Result<Option<RemoteItem>> {
        let query = ListQuery {
            select: pull_select(table),
            filter: Some(odata::eq(&table.pk_internal_name, app_pk)),
            top: Some(1),
            ..ListQuery::default()
        };
        let page = self.remote.query_list_items(table.list_id, &query).await?;
        Ok(page.items.into_iter().next())
    }

    /// Best-effort mirror refresh after a successful server write. The
    /// mirror may briefly lag the server if this fails; the id and key are
    /// already correct.
    pub(crate) async fn refresh_mirror(&self, table: &AppTableConfig, item_id: i64) {
        match self
            .remote
            .get_list_item(table.list_id, item_id, &pull_select(table))
            .await
        {
            Ok(item) => {
                if let Err(err) = self.apply_remote_item(table, &item).await {
                    debug!(
                        entity = %table.entity_name,
                        item_id,
                        error = %err,
                        "post-write mirror refresh failed"
                    );
                }
            }
            Err(err) => {
                debug!(
                    entity = %table.entity_name,
                    item_id,
                    error = %err,
                    "post-write mirror fetch failed"
                );
            }
        }
    }
}

fn payload_object(entry: &ChangeLogEntry) -> Option<Map<String, Value>> {
    match &entry.payload {
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    }
}

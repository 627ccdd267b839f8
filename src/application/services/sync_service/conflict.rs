use crate::application::ports::local_store::{CoreStore, MirrorStore};
use crate::application::ports::remote_connector::{RemoteItem, IF_MATCH_ANY};
use crate::domain::entities::{AppTableConfig, ChangeLogEntry, ConflictDraft, ConflictPolicy};
use crate::shared::error::Result;
use serde_json::{Map, Value};
use tracing::warn;

use super::push::PushOutcome;
use super::SyncEngine;

#[derive(Debug, Copy, Clone)]
enum ConflictKind {
    Concurrency,
    InsertExists,
}

impl ConflictKind {
    fn describe(&self) -> &'static str {
        match self {
            ConflictKind::Concurrency => "optimistic concurrency failure on update",
            ConflictKind::InsertExists => "create collided with an existing server item",
        }
    }
}

impl<S> SyncEngine<S>
where
    S: CoreStore + MirrorStore,
{
    /// Update/SoftDelete hit a 409/412: the server row moved under us.
    pub(crate) async fn resolve_concurrency_conflict(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
        payload: &Map<String, Value>,
        local_etag: Option<String>,
        server_item: &RemoteItem,
    ) -> Result<PushOutcome> {
        self.append_conflict_log(
            table,
            entry,
            payload,
            local_etag,
            server_item,
            ConflictKind::Concurrency,
        )
        .await?;

        match table.conflict_policy {
            ConflictPolicy::Manual => {
                self.store()
                    .mark_change_conflicted(entry.id, ConflictKind::Concurrency.describe())
                    .await?;
                // The mirror tracks the observable server state while the
                // change waits for an operator.
                self.apply_remote_item(table, server_item).await?;
                Ok(PushOutcome::Conflicted)
            }
            ConflictPolicy::ServerWins => {
                self.apply_remote_item(table, server_item).await?;
                Ok(PushOutcome::Applied)
            }
            ConflictPolicy::ClientWins => {
                self.client_wins_overwrite(table, entry, payload, server_item)
                    .await
            }
        }
    }

    /// Insert hit a unique-key collision: an item with this key already
    /// exists on the server.
    pub(crate) async fn resolve_insert_exists(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
        payload: &Map<String, Value>,
        server_item: &RemoteItem,
    ) -> Result<PushOutcome> {
        let local_etag = self
            .store()
            .get_row(&table.entity_name, &entry.app_pk)
            .await?
            .and_then(|row| row.system.sharepoint_etag);

        self.append_conflict_log(
            table,
            entry,
            payload,
            local_etag,
            server_item,
            ConflictKind::InsertExists,
        )
        .await?;

        match table.conflict_policy {
            ConflictPolicy::Manual => {
                self.store()
                    .mark_change_conflicted(entry.id, ConflictKind::InsertExists.describe())
                    .await?;
                self.apply_remote_item(table, server_item).await?;
                Ok(PushOutcome::Conflicted)
            }
            ConflictPolicy::ServerWins => {
                // The existing server row is authoritative.
                self.apply_remote_item(table, server_item).await?;
                Ok(PushOutcome::Applied)
            }
            ConflictPolicy::ClientWins => {
                // Adopt the existing id and overwrite its fields.
                self.client_wins_overwrite(table, entry, payload, server_item)
                    .await
            }
        }
    }

    /// One retry with the server's ETag. A second concurrency failure is
    /// terminal; there is no retry loop within a single drain.
    async fn client_wins_overwrite(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
        payload: &Map<String, Value>,
        server_item: &RemoteItem,
    ) -> Result<PushOutcome> {
        let if_match = server_item.etag.as_deref().unwrap_or(IF_MATCH_ANY);

        match self
            .remote
            .update_list_item(table.list_id, server_item.id, payload, if_match)
            .await
        {
            Ok(()) => {
                self.refresh_mirror(table, server_item.id).await;
                Ok(PushOutcome::Applied)
            }
            Err(err) if err.is_concurrency_conflict() => {
                warn!(
                    entity = %table.entity_name,
                    app_pk = %entry.app_pk,
                    "client-wins retry lost a second race, holding change as conflict"
                );
                self.store()
                    .mark_change_conflicted(
                        entry.id,
                        &format!("client-wins retry failed: {err}"),
                    )
                    .await?;
                Ok(PushOutcome::Conflicted)
            }
            Err(err) => Ok(PushOutcome::Failed(err.to_string())),
        }
    }

    async fn append_conflict_log(
        &self,
        table: &AppTableConfig,
        entry: &ChangeLogEntry,
        payload: &Map<String, Value>,
        local_etag: Option<String>,
        server_item: &RemoteItem,
        kind: ConflictKind,
    ) -> Result<()> {
        warn!(
            entity = %table.entity_name,
            app_pk = %entry.app_pk,
            change_id = entry.id,
            policy = table.conflict_policy.as_str(),
            "{}",
            kind.describe()
        );

        self.store()
            .log_conflict(ConflictDraft {
                entity_name: table.entity_name.clone(),
                app_pk: entry.app_pk.clone(),
                change_id: entry.id,
                operation: entry.operation,
                policy: table.conflict_policy,
                sharepoint_id: Some(server_item.id),
                local_etag,
                server_etag: server_item.etag.clone(),
                local_payload: Some(Value::Object(payload.clone())),
                server_fields: Some(Value::Object(server_item.fields.clone())),
                message: kind.describe().to_string(),
            })
            .await?;
        Ok(())
    }
}

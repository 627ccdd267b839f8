use crate::application::ports::local_store::MirrorStore;
use crate::domain::entities::mirror::{
    self, MirrorRow, SystemColumns, COL_APP_PK, COL_DELETED_AT_UTC, COL_IS_DELETED, COL_SP_ETAG,
    COL_SP_ID, COL_SP_MODIFIED_UTC,
};
use crate::domain::entities::AppTableConfig;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, QueryBuilder, Row, Sqlite};
use std::collections::{BTreeMap, HashSet};

use super::sqlite_store::SqliteStore;
use super::{format_utc, parse_utc_opt};

/// Quotes a runtime identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Index names cannot be quoted portably, so they are reduced to a safe
/// alphabet instead.
fn index_ident(entity_name: &str, column: &str) -> String {
    let sanitize = |text: &str| -> String {
        text.chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect()
    };
    format!("idx_{}_{}", sanitize(entity_name), sanitize(column))
}

fn require_entity_name(entity_name: &str) -> Result<()> {
    if entity_name.trim().is_empty() {
        return Err(AppError::InvalidInput("entity name is empty".to_string()));
    }
    Ok(())
}

impl SqliteStore {
    async fn table_columns(&self, entity_name: &str) -> Result<HashSet<String>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(entity_name));
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;

        let mut columns = HashSet::new();
        for row in rows {
            columns.insert(row.try_get::<String, _>("name")?);
        }
        Ok(columns)
    }

    async fn create_index(&self, entity_name: &str, column: &str) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            index_ident(entity_name, column),
            quote_ident(entity_name),
            quote_ident(column)
        );
        sqlx::query(&sql).execute(self.pool()).await?;
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for SqliteStore {
    async fn ensure_entity_schema(&self, table: &AppTableConfig) -> Result<()> {
        require_entity_name(&table.entity_name)?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                {} TEXT PRIMARY KEY, \
                {} INTEGER NOT NULL DEFAULT 0, \
                {} TEXT, \
                {} INTEGER, \
                {} TEXT, \
                {} TEXT\
            )",
            quote_ident(&table.entity_name),
            quote_ident(COL_APP_PK),
            quote_ident(COL_IS_DELETED),
            quote_ident(COL_DELETED_AT_UTC),
            quote_ident(COL_SP_ID),
            quote_ident(COL_SP_MODIFIED_UTC),
            quote_ident(COL_SP_ETAG),
        );
        sqlx::query(&create).execute(self.pool()).await?;

        let mut columns = self.table_columns(&table.entity_name).await?;

        for field in &table.select_fields {
            if mirror::is_reserved_column(field)
                || field.eq_ignore_ascii_case(&table.pk_internal_name)
                || columns.contains(field)
            {
                continue;
            }
            let alter = format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT",
                quote_ident(&table.entity_name),
                quote_ident(field)
            );
            sqlx::query(&alter).execute(self.pool()).await?;
            columns.insert(field.clone());
        }

        for column in [COL_IS_DELETED, COL_SP_MODIFIED_UTC, COL_DELETED_AT_UTC] {
            self.create_index(&table.entity_name, column).await?;
        }

        for column in &table.expected_indexes {
            if columns.contains(column) {
                self.create_index(&table.entity_name, column).await?;
            } else {
                tracing::warn!(
                    entity = %table.entity_name,
                    column = %column,
                    "expected index column missing from mirror table, skipping"
                );
            }
        }

        Ok(())
    }

    async fn upsert_row(
        &self,
        entity_name: &str,
        app_pk: &str,
        fields: &BTreeMap<String, Value>,
        system: &SystemColumns,
    ) -> Result<()> {
        require_entity_name(entity_name)?;
        if app_pk.trim().is_empty() {
            return Err(AppError::InvalidInput("AppPK is empty".to_string()));
        }

        let known_columns = self.table_columns(entity_name).await?;

        let mut user_columns: Vec<&String> = Vec::new();
        for name in fields.keys() {
            if mirror::is_reserved_column(name) {
                continue;
            }
            if !known_columns.contains(name) {
                tracing::debug!(
                    entity = %entity_name,
                    column = %name,
                    "skipping field without a mirror column"
                );
                continue;
            }
            user_columns.push(name);
        }

        let mut column_list: Vec<String> = vec![
            quote_ident(COL_APP_PK),
            quote_ident(COL_IS_DELETED),
            quote_ident(COL_DELETED_AT_UTC),
            quote_ident(COL_SP_ID),
            quote_ident(COL_SP_MODIFIED_UTC),
            quote_ident(COL_SP_ETAG),
        ];
        column_list.extend(user_columns.iter().map(|name| quote_ident(name)));

        // INSERT OR REPLACE so the whole row is replaced: fields missing
        // from the map become NULL rather than surviving from a prior write.
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES (",
            quote_ident(entity_name),
            column_list.join(", ")
        ));

        let mut separated = builder.separated(", ");
        separated.push_bind(app_pk.to_string());
        separated.push_bind(system.is_deleted as i64);
        separated.push_bind(system.deleted_at_utc.map(format_utc));
        separated.push_bind(system.sharepoint_id);
        separated.push_bind(system.sharepoint_modified_utc.map(format_utc));
        separated.push_bind(system.sharepoint_etag.clone());
        for name in &user_columns {
            let encoded = serde_json::to_string(&fields[*name])?;
            separated.push_bind(encoded);
        }
        builder.push(")");

        builder.build().execute(self.pool()).await?;
        Ok(())
    }

    async fn get_row(&self, entity_name: &str, app_pk: &str) -> Result<Option<MirrorRow>> {
        require_entity_name(entity_name)?;

        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(entity_name),
            quote_ident(COL_APP_PK)
        );
        let row = sqlx::query(&sql)
            .bind(app_pk)
            .fetch_optional(self.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let system = SystemColumns {
            sharepoint_id: row.try_get::<Option<i64>, _>(COL_SP_ID)?,
            sharepoint_modified_utc: parse_utc_opt(
                row.try_get::<Option<String>, _>(COL_SP_MODIFIED_UTC)?.as_deref(),
            )?,
            sharepoint_etag: row.try_get::<Option<String>, _>(COL_SP_ETAG)?,
            is_deleted: row.try_get::<i64, _>(COL_IS_DELETED)? != 0,
            deleted_at_utc: parse_utc_opt(
                row.try_get::<Option<String>, _>(COL_DELETED_AT_UTC)?.as_deref(),
            )?,
        };

        let mut fields = BTreeMap::new();
        for (index, column) in row.columns().iter().enumerate() {
            let name = column.name();
            if mirror::is_reserved_column(name) {
                continue;
            }
            let Some(encoded) = row.try_get::<Option<String>, _>(index)? else {
                continue;
            };
            // Cells are JSON-encoded on write; tolerate raw text from
            // externally seeded rows.
            let value = serde_json::from_str::<Value>(&encoded)
                .unwrap_or_else(|_| Value::String(encoded));
            fields.insert(name.to_string(), value);
        }

        Ok(Some(MirrorRow {
            app_pk: row.try_get::<String, _>(COL_APP_PK)?,
            fields,
            system,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("Clients"), "\"Clients\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn index_ident_reduces_to_safe_alphabet() {
        assert_eq!(index_ident("Clients", "IsDeleted"), "idx_Clients_IsDeleted");
        assert_eq!(index_ident("a b", "c-d"), "idx_a_b_c_d");
    }
}

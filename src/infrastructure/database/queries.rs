pub const UPSERT_LOCAL_CONFIG: &str = r#"
INSERT INTO local_config (app_id, config_version, tables_json, updated_utc)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(app_id) DO UPDATE SET
    config_version = excluded.config_version,
    tables_json = excluded.tables_json,
    updated_utc = excluded.updated_utc
"#;

pub const SELECT_LOCAL_CONFIG: &str = r#"
SELECT app_id, config_version, tables_json, updated_utc
FROM local_config
WHERE app_id = ?1
"#;

pub const UPSERT_SYNC_STATE: &str = r#"
INSERT INTO sync_state (
    entity_name, last_sync_modified_utc, last_sync_sp_id,
    last_successful_sync_utc, last_config_version_applied, last_error
) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(entity_name) DO UPDATE SET
    last_sync_modified_utc = excluded.last_sync_modified_utc,
    last_sync_sp_id = excluded.last_sync_sp_id,
    last_successful_sync_utc = excluded.last_successful_sync_utc,
    last_config_version_applied = excluded.last_config_version_applied,
    last_error = excluded.last_error
"#;

pub const SELECT_SYNC_STATE: &str = r#"
SELECT * FROM sync_state
WHERE entity_name = ?1
"#;

pub const INSERT_CHANGE: &str = r#"
INSERT INTO change_log (
    entity_name, app_pk, operation, payload_json,
    created_utc, status, attempt_count
) VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0)
"#;

pub const SELECT_PENDING_CHANGES: &str = r#"
SELECT * FROM change_log
WHERE status = 'pending'
ORDER BY created_utc ASC, id ASC
LIMIT ?1
"#;

pub const MARK_CHANGE_APPLIED: &str = r#"
UPDATE change_log
SET status = 'applied', applied_utc = ?1, last_error = NULL
WHERE id = ?2
"#;

pub const MARK_CHANGE_FAILED: &str = r#"
UPDATE change_log
SET attempt_count = attempt_count + 1, last_error = ?1
WHERE id = ?2
"#;

pub const MARK_CHANGE_CONFLICTED: &str = r#"
UPDATE change_log
SET status = 'conflict', attempt_count = attempt_count + 1, last_error = ?1
WHERE id = ?2
"#;

pub const RESET_CHANGE_TO_PENDING: &str = r#"
UPDATE change_log
SET status = 'pending', applied_utc = NULL, last_error = NULL
WHERE id = ?1
"#;

pub const INSERT_CONFLICT: &str = r#"
INSERT INTO conflict_log (
    occurred_utc, entity_name, app_pk, change_id, operation, policy,
    sharepoint_id, local_etag, server_etag,
    local_payload_json, server_fields_json, message
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
"#;

pub const SELECT_RECENT_CONFLICTS: &str = r#"
SELECT * FROM conflict_log
ORDER BY occurred_utc DESC, id DESC
LIMIT ?1
"#;

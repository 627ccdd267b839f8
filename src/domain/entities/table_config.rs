use crate::domain::coerce;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default server-side primary key column.
pub const DEFAULT_PK_INTERNAL_NAME: &str = "AppPK";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    #[default]
    OnOpen,
    OnDemand,
    Never,
}

impl SyncPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPolicy::OnOpen => "OnOpen",
            SyncPolicy::OnDemand => "OnDemand",
            SyncPolicy::Never => "Never",
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(SyncPolicy::OnOpen),
            1 => Some(SyncPolicy::OnDemand),
            2 => Some(SyncPolicy::Never),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "onopen" => Some(SyncPolicy::OnOpen),
            "ondemand" => Some(SyncPolicy::OnDemand),
            "never" => Some(SyncPolicy::Never),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        parse_enum(value, Self::from_name, Self::from_ordinal)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentsMode {
    #[default]
    Disabled,
    Manual,
    Auto,
}

impl AttachmentsMode {
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(AttachmentsMode::Disabled),
            1 => Some(AttachmentsMode::Manual),
            2 => Some(AttachmentsMode::Auto),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "disabled" => Some(AttachmentsMode::Disabled),
            "manual" => Some(AttachmentsMode::Manual),
            "auto" => Some(AttachmentsMode::Auto),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        parse_enum(value, Self::from_name, Self::from_ordinal)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    #[default]
    None,
    ByEntity,
    ByDate,
}

impl PartitionStrategy {
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(PartitionStrategy::None),
            1 => Some(PartitionStrategy::ByEntity),
            2 => Some(PartitionStrategy::ByDate),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(PartitionStrategy::None),
            "byentity" => Some(PartitionStrategy::ByEntity),
            "bydate" => Some(PartitionStrategy::ByDate),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        parse_enum(value, Self::from_name, Self::from_ordinal)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    ServerWins,
    ClientWins,
    Manual,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::ServerWins => "ServerWins",
            ConflictPolicy::ClientWins => "ClientWins",
            ConflictPolicy::Manual => "Manual",
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(ConflictPolicy::ServerWins),
            1 => Some(ConflictPolicy::ClientWins),
            2 => Some(ConflictPolicy::Manual),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "serverwins" => Some(ConflictPolicy::ServerWins),
            "clientwins" => Some(ConflictPolicy::ClientWins),
            "manual" => Some(ConflictPolicy::Manual),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        parse_enum(value, Self::from_name, Self::from_ordinal)
    }
}

fn parse_enum<T>(
    value: &Value,
    from_name: fn(&str) -> Option<T>,
    from_ordinal: fn(i64) -> Option<T>,
) -> Option<T> {
    if let Value::String(name) = value {
        if let Some(parsed) = from_name(name.trim()) {
            return Some(parsed);
        }
    }
    coerce::coerce_i64(value).and_then(from_ordinal)
}

/// Per-entity sync configuration discovered from the server table catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTableConfig {
    pub entity_name: String,
    pub list_id: Uuid,
    pub list_title: String,
    pub enabled: bool,
    pub pk_internal_name: String,
    pub select_fields: Vec<String>,
    pub sync_policy: SyncPolicy,
    pub priority: i32,
    pub attachments_mode: AttachmentsMode,
    pub partition_strategy: PartitionStrategy,
    pub conflict_policy: ConflictPolicy,
    pub expected_indexes: Vec<String>,
}

impl AppTableConfig {
    pub fn new(entity_name: impl Into<String>, list_id: Uuid) -> Self {
        let entity_name = entity_name.into();
        Self {
            list_title: entity_name.clone(),
            entity_name,
            list_id,
            enabled: true,
            pk_internal_name: DEFAULT_PK_INTERNAL_NAME.to_string(),
            select_fields: Vec::new(),
            sync_policy: SyncPolicy::default(),
            priority: 0,
            attachments_mode: AttachmentsMode::default(),
            partition_strategy: PartitionStrategy::default(),
            conflict_policy: ConflictPolicy::default(),
            expected_indexes: Vec::new(),
        }
    }
}

/// The locally persisted configuration snapshot for one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub app_id: String,
    pub config_version: i64,
    pub tables: Vec<AppTableConfig>,
    pub updated_utc: DateTime<Utc>,
}

impl LocalConfig {
    /// Empty default used before the first discovery round-trip.
    pub fn empty(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            config_version: 0,
            tables: Vec::new(),
            updated_utc: Utc::now(),
        }
    }

    pub fn table(&self, entity_name: &str) -> Option<&AppTableConfig> {
        self.tables
            .iter()
            .find(|table| table.entity_name == entity_name)
    }

    /// Enabled tables matching `policy`, ordered by ascending priority.
    pub fn tables_for_policy(&self, policy: SyncPolicy) -> Vec<&AppTableConfig> {
        let mut tables: Vec<&AppTableConfig> = self
            .tables
            .iter()
            .filter(|table| table.enabled && table.sync_policy == policy)
            .collect();
        tables.sort_by_key(|table| table.priority);
        tables
    }

    /// All enabled tables, ordered by ascending priority.
    pub fn enabled_tables(&self) -> Vec<&AppTableConfig> {
        let mut tables: Vec<&AppTableConfig> =
            self.tables.iter().filter(|table| table.enabled).collect();
        tables.sort_by_key(|table| table.priority);
        tables
    }
}

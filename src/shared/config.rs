use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Server page size for incremental pulls.
    pub page_size: u32,
    /// Overlap subtracted from the watermark to absorb server clock skew.
    pub pull_overlap_minutes: i64,
    /// Maximum outbox rows drained per SyncUp invocation.
    pub max_changes_per_drain: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 200,
            pull_overlap_minutes: 5,
            max_changes_per_drain: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/listmirror.db".to_string(),
            max_connections: 5,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The incremental pull cursor: server modified time, tie-broken by item id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    pub modified_utc: DateTime<Utc>,
    pub sp_id: i64,
}

impl Watermark {
    pub fn new(modified_utc: DateTime<Utc>, sp_id: i64) -> Self {
        Self {
            modified_utc,
            sp_id,
        }
    }
}

/// Per-entity sync bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub entity_name: String,
    pub last_sync_modified_utc: Option<DateTime<Utc>>,
    pub last_sync_sp_id: Option<i64>,
    pub last_successful_sync_utc: Option<DateTime<Utc>>,
    pub last_config_version_applied: Option<i64>,
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn empty(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            last_sync_modified_utc: None,
            last_sync_sp_id: None,
            last_successful_sync_utc: None,
            last_config_version_applied: None,
            last_error: None,
        }
    }

    pub fn watermark(&self) -> Option<Watermark> {
        match (self.last_sync_modified_utc, self.last_sync_sp_id) {
            (Some(modified_utc), Some(sp_id)) => Some(Watermark::new(modified_utc, sp_id)),
            _ => None,
        }
    }

    /// Advances the watermark, never moving it backwards.
    pub fn advance_watermark(&mut self, candidate: Watermark) {
        let next = match self.watermark() {
            Some(current) => current.max(candidate),
            None => candidate,
        };
        self.last_sync_modified_utc = Some(next.modified_utc);
        self.last_sync_sp_id = Some(next.sp_id);
    }
}

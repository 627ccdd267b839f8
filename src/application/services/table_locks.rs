use crate::shared::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Per-entity mutual exclusion: a binary semaphore per entity name behind
/// one coarse map lock. Two syncs of the same entity serialize; distinct
/// entities proceed concurrently.
#[derive(Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, entity_name: &str) -> Result<OwnedSemaphorePermit> {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(entity_name.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(1))),
            )
        };

        semaphore
            .acquire_owned()
            .await
            .map_err(|err| AppError::Internal(format!("table lock closed: {err}")))
    }
}

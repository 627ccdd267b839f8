mod conflict;
mod pull;
mod push;


pub use pull::PullReport;
pub use push::PushReport;

use crate::application::ports::local_store::{CoreStore, MirrorStore};
use crate::application::ports::remote_connector::RemoteConnector;
use crate::shared::config::SyncOptions;
use crate::shared::error::{AppError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Orchestrates per-table incremental pulls and outbox drains against the
/// remote connector. The engine only sees the two narrow store contracts.
pub struct SyncEngine<S>
where
    S: CoreStore + MirrorStore,
{
    store: Arc<S>,
    remote: Arc<dyn RemoteConnector>,
    options: SyncOptions,
}

impl<S> SyncEngine<S>
where
    S: CoreStore + MirrorStore,
{
    pub fn new(store: Arc<S>, remote: Arc<dyn RemoteConnector>, options: SyncOptions) -> Self {
        Self {
            store,
            remote,
            options,
        }
    }

    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}

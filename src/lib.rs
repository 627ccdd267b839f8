//! Offline-first bidirectional synchronization for list-oriented document
//! stores. The client reads and writes a local SQLite mirror at all times;
//! mutations land in a durable outbox and are reconciled with the server in
//! the background, with monotonic watermarks on the pull side and ETag
//! optimistic concurrency on the push side.

pub mod application;
pub mod client;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::local_store::{CoreStore, MirrorStore};
pub use application::ports::remote_connector::{
    ItemPage, ListQuery, RemoteConnector, RemoteError, RemoteItem, RemoteResult, IF_MATCH_ANY,
};
pub use application::services::{ConfigurationService, PullReport, PushReport, SyncEngine};
pub use client::{SyncClient, SyncSummary};
pub use domain::entities::{
    AppTableConfig, AttachmentsMode, ChangeDraft, ChangeLogEntry, ChangeOperation, ChangeStatus,
    ConflictDraft, ConflictLogEntry, ConflictPolicy, LocalConfig, MirrorRow, PartitionStrategy,
    SyncPolicy, SyncState, SystemColumns, Watermark,
};
pub use infrastructure::database::{ConnectionPool, SqliteStore};
pub use shared::config::SyncOptions;
pub use shared::error::{AppError, Result};

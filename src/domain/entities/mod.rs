pub mod change_log;
pub mod conflict_log;
pub mod mirror;
pub mod sync_state;
pub mod table_config;

pub use change_log::{ChangeDraft, ChangeLogEntry, ChangeOperation, ChangeStatus};
pub use conflict_log::{ConflictDraft, ConflictLogEntry};
pub use mirror::{MirrorRow, SystemColumns};
pub use sync_state::{SyncState, Watermark};
pub use table_config::{
    AppTableConfig, AttachmentsMode, ConflictPolicy, LocalConfig, PartitionStrategy, SyncPolicy,
};

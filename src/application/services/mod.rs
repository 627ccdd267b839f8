pub mod config_service;
pub mod sync_service;
pub mod table_locks;

pub use config_service::ConfigurationService;
pub use sync_service::{PullReport, PushReport, SyncEngine};
pub use table_locks::TableLocks;

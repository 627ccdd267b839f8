pub mod local_store;
pub mod remote_connector;

pub use local_store::{CoreStore, MirrorStore};
pub use remote_connector::{
    ItemPage, ListQuery, RemoteConnector, RemoteError, RemoteItem, RemoteResult, IF_MATCH_ANY,
};

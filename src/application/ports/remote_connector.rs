use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// One list item as returned by the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: i64,
    pub etag: Option<String>,
    pub modified_utc: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

/// A paged list query. `filter` and `order_by` use the OData dialect of
/// [`crate::shared::odata`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub top: Option<u32>,
    pub page_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items: Vec<RemoteItem>,
    pub next_page_cursor: Option<String>,
}

/// If-Match header value for unconditional writes.
pub const IF_MATCH_ANY: &str = "*";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote request failed: {status} {reason}")]
    Request {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("remote transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn request(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        RemoteError::Request {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Optimistic-concurrency failure: 409/412, or a 400 whose body cites
    /// the ETag precondition.
    pub fn is_concurrency_conflict(&self) -> bool {
        match self {
            RemoteError::Request { status, body, .. } => match status {
                409 | 412 => true,
                400 => contains_any(body, &["etag", "precondition"]),
                _ => false,
            },
            RemoteError::Transport(_) => false,
        }
    }

    /// Unique-key violation on create: 409, or a 400/500 whose body cites
    /// a uniqueness constraint.
    pub fn is_already_exists(&self) -> bool {
        match self {
            RemoteError::Request { status, body, .. } => match status {
                409 => true,
                400 | 500 => contains_any(body, &["unique", "already", "duplicate"]),
                _ => false,
            },
            RemoteError::Transport(_) => false,
        }
    }
}

fn contains_any(body: &str, needles: &[&str]) -> bool {
    let lowered = body.to_ascii_lowercase();
    needles.iter().any(|needle| lowered.contains(needle))
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Contract of the HTTP/REST connector. Authentication, cookie handling,
/// form digests and the 401/403 single-retry live behind this boundary.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn list_id_by_title(&self, title: &str) -> RemoteResult<Uuid>;

    async fn query_list_items(&self, list_id: Uuid, query: &ListQuery) -> RemoteResult<ItemPage>;

    async fn get_list_item(
        &self,
        list_id: Uuid,
        item_id: i64,
        select: &[String],
    ) -> RemoteResult<RemoteItem>;

    /// Returns the id of the created item.
    async fn create_list_item(&self, list_id: Uuid, fields: &Map<String, Value>)
        -> RemoteResult<i64>;

    /// `if_match` is an explicit ETag for optimistic writes or
    /// [`IF_MATCH_ANY`] for unconditional ones.
    async fn update_list_item(
        &self,
        list_id: Uuid,
        item_id: i64,
        fields: &Map<String, Value>,
        if_match: &str,
    ) -> RemoteResult<()>;

    // Attachment primitives are only exercised by out-of-core tooling;
    // connectors without attachment support keep the defaults.

    async fn list_attachments(&self, _list_id: Uuid, _item_id: i64) -> RemoteResult<Vec<String>> {
        Err(RemoteError::Transport(
            "attachments not supported by this connector".to_string(),
        ))
    }

    async fn download_attachment(
        &self,
        _list_id: Uuid,
        _item_id: i64,
        _file_name: &str,
    ) -> RemoteResult<Vec<u8>> {
        Err(RemoteError::Transport(
            "attachments not supported by this connector".to_string(),
        ))
    }

    async fn upload_attachment(
        &self,
        _list_id: Uuid,
        _item_id: i64,
        _file_name: &str,
        _content: &[u8],
    ) -> RemoteResult<()> {
        Err(RemoteError::Transport(
            "attachments not supported by this connector".to_string(),
        ))
    }

    async fn delete_attachment(
        &self,
        _list_id: Uuid,
        _item_id: i64,
        _file_name: &str,
    ) -> RemoteResult<()> {
        Err(RemoteError::Transport(
            "attachments not supported by this connector".to_string(),
        ))
    }
}

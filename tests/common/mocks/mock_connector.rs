use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listmirror::domain::coerce;
use listmirror::{ItemPage, ListQuery, RemoteConnector, RemoteError, RemoteItem, RemoteResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MockItem {
    pub fields: Map<String, Value>,
    pub modified_utc: DateTime<Utc>,
    pub version: u64,
}

impl MockItem {
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.version)
    }
}

#[derive(Debug, Default)]
struct MockList {
    unique_field: Option<String>,
    next_id: i64,
    items: BTreeMap<i64, MockItem>,
}

/// Scriptable in-memory stand-in for the REST connector: filter- and
/// order-aware paging, ETag versioning, unique-key enforcement, plus
/// switches to simulate offline windows and lost races.
#[derive(Default)]
pub struct MockConnector {
    lists: Mutex<HashMap<Uuid, MockList>>,
    titles: Mutex<HashMap<String, Uuid>>,
    operations: Mutex<Vec<String>>,
    offline: AtomicBool,
    forced_update_conflicts: AtomicU32,
    reject_conflict_policy_select: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_list(&self, title: &str, unique_field: Option<&str>) -> Uuid {
        let list_id = Uuid::new_v4();
        self.lists.lock().unwrap().insert(
            list_id,
            MockList {
                unique_field: unique_field.map(str::to_string),
                next_id: 1,
                items: BTreeMap::new(),
            },
        );
        self.titles
            .lock()
            .unwrap()
            .insert(title.to_string(), list_id);
        list_id
    }

    pub fn seed_item(
        &self,
        list_id: Uuid,
        fields: Map<String, Value>,
        modified_utc: DateTime<Utc>,
    ) -> i64 {
        let mut lists = self.lists.lock().unwrap();
        let list = lists.get_mut(&list_id).expect("unknown mock list");
        let id = list.next_id;
        list.next_id += 1;
        list.items.insert(
            id,
            MockItem {
                fields,
                modified_utc,
                version: 1,
            },
        );
        id
    }

    /// Simulates a concurrent edit made by another client: merges the
    /// patch, bumps the version and the modified time.
    pub fn update_item_server_side(
        &self,
        list_id: Uuid,
        item_id: i64,
        patch: Map<String, Value>,
        modified_utc: DateTime<Utc>,
    ) {
        let mut lists = self.lists.lock().unwrap();
        let item = lists
            .get_mut(&list_id)
            .and_then(|list| list.items.get_mut(&item_id))
            .expect("unknown mock item");
        for (name, value) in patch {
            item.fields.insert(name, value);
        }
        item.version += 1;
        item.modified_utc = modified_utc;
    }

    pub fn item(&self, list_id: Uuid, item_id: i64) -> Option<MockItem> {
        self.lists
            .lock()
            .unwrap()
            .get(&list_id)
            .and_then(|list| list.items.get(&item_id).cloned())
    }

    pub fn find_id_by_field(&self, list_id: Uuid, field: &str, value: &str) -> Option<i64> {
        let lists = self.lists.lock().unwrap();
        lists.get(&list_id).and_then(|list| {
            list.items
                .iter()
                .find(|(_, item)| {
                    item.fields.get(field).and_then(coerce::coerce_string).as_deref()
                        == Some(value)
                })
                .map(|(id, _)| *id)
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The next `count` updates fail with 412 regardless of the ETag sent.
    pub fn force_update_conflicts(&self, count: u32) {
        self.forced_update_conflicts.store(count, Ordering::SeqCst);
    }

    /// Emulates an old deployment whose table catalog has no
    /// ConflictPolicy column.
    pub fn reject_conflict_policy_select(&self, reject: bool) {
        self.reject_conflict_policy_select
            .store(reject, Ordering::SeqCst);
    }

    /// Server-side writes observed, in order, as `op:value` strings.
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn record(&self, operation: String) {
        self.operations.lock().unwrap().push(operation);
    }
}

fn unquote(literal: &str) -> Option<String> {
    let inner = literal.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

fn parse_datetime_literal(literal: &str) -> Option<DateTime<Utc>> {
    let inner = literal
        .trim()
        .strip_prefix("datetime'")?
        .strip_suffix('\'')?;
    DateTime::parse_from_rfc3339(inner)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn matches_filter(item: &MockItem, filter: &str) -> bool {
    if let Some((field, literal)) = filter.split_once(" ge ") {
        let Some(bound) = parse_datetime_literal(literal) else {
            return false;
        };
        return if field.trim() == "Modified" {
            item.modified_utc >= bound
        } else {
            item.fields
                .get(field.trim())
                .and_then(coerce::coerce_datetime)
                .map(|value| value >= bound)
                .unwrap_or(false)
        };
    }

    if let Some((field, literal)) = filter.split_once(" eq ") {
        let Some(expected) = unquote(literal) else {
            return false;
        };
        return item
            .fields
            .get(field.trim())
            .and_then(coerce::coerce_string)
            .map(|value| value == expected)
            .unwrap_or(false);
    }

    false
}

#[async_trait]
impl RemoteConnector for MockConnector {
    async fn list_id_by_title(&self, title: &str) -> RemoteResult<Uuid> {
        self.check_online()?;
        self.titles
            .lock()
            .unwrap()
            .get(title)
            .copied()
            .ok_or_else(|| RemoteError::request(404, "Not Found", format!("no list '{title}'")))
    }

    async fn query_list_items(&self, list_id: Uuid, query: &ListQuery) -> RemoteResult<ItemPage> {
        self.check_online()?;

        if self.reject_conflict_policy_select.load(Ordering::SeqCst)
            && query.select.iter().any(|name| name == "ConflictPolicy")
        {
            return Err(RemoteError::request(
                400,
                "Bad Request",
                "Column 'ConflictPolicy' does not exist in the list schema",
            ));
        }

        let lists = self.lists.lock().unwrap();
        let list = lists
            .get(&list_id)
            .ok_or_else(|| RemoteError::request(404, "Not Found", "no such list"))?;

        let mut matched: Vec<(i64, MockItem)> = list
            .items
            .iter()
            .filter(|(_, item)| {
                query
                    .filter
                    .as_deref()
                    .map(|filter| matches_filter(item, filter))
                    .unwrap_or(true)
            })
            .map(|(id, item)| (*id, item.clone()))
            .collect();

        match query.order_by.as_deref() {
            Some("Modified asc, Id asc") => {
                matched.sort_by_key(|(id, item)| (item.modified_utc, *id));
            }
            Some("Priority asc") => {
                matched.sort_by_key(|(id, item)| {
                    (
                        item.fields
                            .get("Priority")
                            .and_then(coerce::coerce_i64)
                            .unwrap_or(0),
                        *id,
                    )
                });
            }
            _ => matched.sort_by_key(|(id, _)| *id),
        }

        let offset: usize = query
            .page_cursor
            .as_deref()
            .and_then(|cursor| cursor.parse().ok())
            .unwrap_or(0);
        let page_size = query.top.unwrap_or(u32::MAX) as usize;
        let end = (offset + page_size).min(matched.len());
        let next_page_cursor = (end < matched.len()).then(|| end.to_string());

        let items = matched[offset.min(end)..end]
            .iter()
            .map(|(id, item)| {
                // Honor $select the way the real service does.
                let fields = if query.select.is_empty() {
                    item.fields.clone()
                } else {
                    item.fields
                        .iter()
                        .filter(|(name, _)| query.select.iter().any(|sel| sel == *name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                };
                RemoteItem {
                    id: *id,
                    etag: Some(item.etag()),
                    modified_utc: item.modified_utc,
                    fields,
                }
            })
            .collect();

        Ok(ItemPage {
            items,
            next_page_cursor,
        })
    }

    async fn get_list_item(
        &self,
        list_id: Uuid,
        item_id: i64,
        _select: &[String],
    ) -> RemoteResult<RemoteItem> {
        self.check_online()?;
        let lists = self.lists.lock().unwrap();
        let item = lists
            .get(&list_id)
            .and_then(|list| list.items.get(&item_id))
            .ok_or_else(|| RemoteError::request(404, "Not Found", "no such item"))?;
        Ok(RemoteItem {
            id: item_id,
            etag: Some(item.etag()),
            modified_utc: item.modified_utc,
            fields: item.fields.clone(),
        })
    }

    async fn create_list_item(
        &self,
        list_id: Uuid,
        fields: &Map<String, Value>,
    ) -> RemoteResult<i64> {
        self.check_online()?;
        let mut lists = self.lists.lock().unwrap();
        let list = lists
            .get_mut(&list_id)
            .ok_or_else(|| RemoteError::request(404, "Not Found", "no such list"))?;

        if let Some(unique_field) = list.unique_field.clone() {
            let candidate = fields.get(&unique_field).and_then(coerce::coerce_string);
            if let Some(candidate) = candidate {
                let exists = list.items.values().any(|item| {
                    item.fields
                        .get(&unique_field)
                        .and_then(coerce::coerce_string)
                        .as_deref()
                        == Some(candidate.as_str())
                });
                if exists {
                    return Err(RemoteError::request(
                        409,
                        "Conflict",
                        format!("duplicate value for unique column '{unique_field}'"),
                    ));
                }
            }
        }

        let id = list.next_id;
        list.next_id += 1;
        list.items.insert(
            id,
            MockItem {
                fields: fields.clone(),
                modified_utc: Utc::now(),
                version: 1,
            },
        );
        drop(lists);

        self.record(format!("create:{id}"));
        Ok(id)
    }

    async fn update_list_item(
        &self,
        list_id: Uuid,
        item_id: i64,
        fields: &Map<String, Value>,
        if_match: &str,
    ) -> RemoteResult<()> {
        self.check_online()?;

        let forced = self.forced_update_conflicts.load(Ordering::SeqCst);
        if forced > 0 {
            self.forced_update_conflicts
                .store(forced - 1, Ordering::SeqCst);
            return Err(RemoteError::request(
                412,
                "Precondition Failed",
                "forced etag mismatch",
            ));
        }

        let mut lists = self.lists.lock().unwrap();
        let item = lists
            .get_mut(&list_id)
            .and_then(|list| list.items.get_mut(&item_id))
            .ok_or_else(|| RemoteError::request(404, "Not Found", "no such item"))?;

        if if_match != "*" && if_match != item.etag() {
            return Err(RemoteError::request(
                412,
                "Precondition Failed",
                "etag does not match the current item version",
            ));
        }

        for (name, value) in fields {
            item.fields.insert(name.clone(), value.clone());
        }
        item.version += 1;
        item.modified_utc = Utc::now();
        drop(lists);

        self.record(format!("update:{item_id}"));
        Ok(())
    }
}

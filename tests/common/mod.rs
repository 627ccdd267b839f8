#![allow(dead_code)]

pub mod mocks;

use chrono::{DateTime, TimeZone, Utc};
use listmirror::{ConflictPolicy, SqliteStore, SyncClient, SyncOptions};
use mocks::MockConnector;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const APP_ID: &str = "crm";

pub struct TestHarness {
    pub connector: Arc<MockConnector>,
    pub store: Arc<SqliteStore>,
    pub client: SyncClient<SqliteStore>,
    pub clients_list: Uuid,
    pub tables_list: Uuid,
    pub config_list: Uuid,
}

pub fn fields(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in entries {
        map.insert(name.to_string(), value);
    }
    map
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

/// One application (`crm`) with one entity (`Clients`, fields Title/Value,
/// unique AppPK) under the given conflict policy.
pub async fn setup(policy: ConflictPolicy) -> TestHarness {
    let connector = Arc::new(MockConnector::new());

    let config_list = connector.register_list("APP_Config", None);
    let tables_list = connector.register_list("APP_Tables", None);
    let clients_list = connector.register_list("Client list", Some("AppPK"));

    connector.seed_item(
        config_list,
        fields(vec![
            ("AppId", json!(APP_ID)),
            ("ConfigVersion", json!(1)),
            ("MinClientVersion", json!("1.0")),
        ]),
        at(0, 0),
    );
    connector.seed_item(
        tables_list,
        fields(vec![
            ("EntityName", json!("Clients")),
            ("ListId", json!(clients_list.to_string())),
            ("ListTitle", json!("Client list")),
            ("Enabled", json!(true)),
            ("PkInternalName", json!("AppPK")),
            ("SelectFieldsJson", json!("[\"Title\",\"Value\"]")),
            ("SyncPolicy", json!(0)),
            ("Priority", json!(1)),
            ("ConflictPolicy", json!(policy as i64)),
        ]),
        at(0, 0),
    );

    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let client = SyncClient::new(
        APP_ID,
        Arc::clone(&store),
        connector.clone() as Arc<dyn listmirror::RemoteConnector>,
        SyncOptions::default(),
    );

    TestHarness {
        connector,
        store,
        client,
        clients_list,
        tables_list,
        config_list,
    }
}

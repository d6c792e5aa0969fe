//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p table-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use table_store::{
    PostgresTableStore, Record, RecordFilter, SaveOptions, TableStore, TableStoreError,
    TableStoreExt, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_records_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresTableStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE records")
        .execute(&pool)
        .await
        .unwrap();

    PostgresTableStore::new(pool)
}

fn inventory_record(key: &str, version: Version, available: u32) -> Record {
    Record::builder()
        .entity("inventory")
        .key(key)
        .version(version)
        .payload_raw(serde_json::json!({"sku": key, "available": available, "reserved": 0}))
        .build()
}

#[tokio::test]
async fn save_and_load_record() {
    let store = get_test_store().await;

    let record = inventory_record("SKU-001", Version::first(), 100);
    let version = store
        .save(record, SaveOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let loaded = store.load("inventory", "SKU-001").await.unwrap().unwrap();
    assert_eq!(loaded.entity, "inventory");
    assert_eq!(loaded.key, "SKU-001");
    assert_eq!(loaded.payload["available"], 100);
}

#[tokio::test]
async fn load_missing_record_returns_none() {
    let store = get_test_store().await;
    let result = store.load("inventory", "SKU-404").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn concurrency_conflict_on_stale_version() {
    let store = get_test_store().await;

    store
        .save(
            inventory_record("SKU-001", Version::first(), 100),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    // A second writer that still believes the record is new must fail
    let result = store
        .save(
            inventory_record("SKU-001", Version::new(2), 90),
            SaveOptions::expect_new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(TableStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
async fn save_with_matching_version_succeeds() {
    let store = get_test_store().await;

    store
        .save(
            inventory_record("SKU-001", Version::first(), 100),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    let version = store
        .save(
            inventory_record("SKU-001", Version::new(2), 70),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let loaded = store.load("inventory", "SKU-001").await.unwrap().unwrap();
    assert_eq!(loaded.payload["available"], 70);
}

#[tokio::test]
async fn load_all_with_containment_filter() {
    let store = get_test_store().await;

    for (key, available) in [("SKU-001", 100u32), ("SKU-002", 0), ("SKU-003", 100)] {
        store
            .save(
                inventory_record(key, Version::first(), available),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
    }

    let in_stock = store
        .load_all(
            "inventory",
            RecordFilter::new().field_equals("available", serde_json::json!(100)),
        )
        .await
        .unwrap();
    assert_eq!(in_stock.len(), 2);

    let limited = store
        .load_all(
            "inventory",
            RecordFilter::new()
                .field_equals("available", serde_json::json!(100))
                .limit(1),
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn patch_by_payload_field() {
    let store = get_test_store().await;

    store
        .save(
            inventory_record("SKU-001", Version::first(), 100),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    let patched = store
        .patch(
            "inventory",
            "sku",
            &serde_json::json!("SKU-001"),
            &serde_json::json!({"reserved": 30}),
        )
        .await
        .unwrap();
    assert_eq!(patched, 1);

    let record = store.load("inventory", "SKU-001").await.unwrap().unwrap();
    assert_eq!(record.payload["available"], 100);
    assert_eq!(record.payload["reserved"], 30);
    assert_eq!(record.version, Version::new(2));
}

#[tokio::test]
async fn patch_by_record_key() {
    let store = get_test_store().await;

    store
        .save(
            inventory_record("SKU-001", Version::first(), 100),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    let patched = store
        .patch(
            "inventory",
            "key",
            &serde_json::json!("SKU-001"),
            &serde_json::json!({"available": 55}),
        )
        .await
        .unwrap();
    assert_eq!(patched, 1);

    let record = store.load("inventory", "SKU-001").await.unwrap().unwrap();
    assert_eq!(record.payload["available"], 55);
}

#[tokio::test]
async fn delete_by_payload_field() {
    let store = get_test_store().await;

    store
        .save(
            inventory_record("SKU-001", Version::first(), 100),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .save(
            inventory_record("SKU-002", Version::first(), 50),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    let deleted = store
        .delete_by_id("inventory", "sku", &serde_json::json!("SKU-001"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert!(store.load("inventory", "SKU-001").await.unwrap().is_none());
    assert!(store.load("inventory", "SKU-002").await.unwrap().is_some());
}

#[tokio::test]
async fn typed_state_roundtrip() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Counters {
        sku: String,
        available: u32,
        reserved: u32,
    }

    let store = get_test_store().await;
    let state = Counters {
        sku: "SKU-001".to_string(),
        available: 700,
        reserved: 300,
    };

    let version = store
        .save_state("inventory", "SKU-001", Version::initial(), &state)
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let (loaded, loaded_version) = store
        .load_state::<Counters>("inventory", "SKU-001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded_version, Version::first());
}

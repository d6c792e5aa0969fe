use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Record, RecordFilter, Result, TableStoreError, Version,
    store::{SaveOptions, TableStore, merge_partial},
};

/// In-memory table store implementation for testing.
///
/// This implementation stores all records in memory and provides
/// the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryTableStore {
    records: Arc<RwLock<HashMap<String, HashMap<String, Record>>>>,
}

impl InMemoryTableStore {
    /// Creates a new empty in-memory table store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored across all entities.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.values().map(HashMap::len).sum()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

fn key_matches(record: &Record, key_field: &str, key_value: &serde_json::Value) -> bool {
    if key_field == "key" {
        key_value.as_str() == Some(record.key.as_str())
    } else {
        record.payload.get(key_field) == Some(key_value)
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn load(&self, entity: &str, key: &str) -> Result<Option<Record>> {
        let records = self.records.read().await;
        Ok(records
            .get(entity)
            .and_then(|table| table.get(key))
            .cloned())
    }

    async fn load_all(&self, entity: &str, filter: RecordFilter) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        let mut matches: Vec<Record> = records
            .get(entity)
            .map(|table| {
                table
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Sort by update time then key for a stable order
        matches.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });

        let offset = filter.offset.unwrap_or(0);
        let matches: Vec<Record> = matches.into_iter().skip(offset).collect();

        let matches = if let Some(limit) = filter.limit {
            matches.into_iter().take(limit).collect()
        } else {
            matches
        };

        Ok(matches)
    }

    async fn save(&self, record: Record, options: SaveOptions) -> Result<Version> {
        let mut records = self.records.write().await;
        let table = records.entry(record.entity.clone()).or_default();

        let current = table
            .get(&record.key)
            .map(|existing| existing.version)
            .unwrap_or(Version::initial());

        // Check expected version if specified
        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(TableStoreError::ConcurrencyConflict {
                entity: record.entity,
                key: record.key,
                expected,
                actual: current,
            });
        }

        // Check for version regressions (unique constraint simulation)
        if record.version <= current && current != Version::initial() {
            return Err(TableStoreError::ConcurrencyConflict {
                entity: record.entity,
                key: record.key,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let version = record.version;
        table.insert(record.key.clone(), record);
        Ok(version)
    }

    async fn patch(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
        partial: &serde_json::Value,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        let Some(table) = records.get_mut(entity) else {
            return Ok(0);
        };

        let mut patched = 0;
        for record in table.values_mut() {
            if key_matches(record, key_field, key_value) {
                merge_partial(&mut record.payload, partial);
                record.version = record.version.next();
                record.updated_at = Utc::now();
                patched += 1;
            }
        }
        Ok(patched)
    }

    async fn delete_by_id(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        let Some(table) = records.get_mut(entity) else {
            return Ok(0);
        };

        let before = table.len();
        table.retain(|_, record| !key_matches(record, key_field, key_value));
        Ok((before - table.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TableStoreExt;

    fn inventory_record(key: &str, version: Version, available: u32) -> Record {
        Record::builder()
            .entity("inventory")
            .key(key)
            .version(version)
            .payload_raw(serde_json::json!({"sku": key, "available": available}))
            .build()
    }

    #[tokio::test]
    async fn save_and_load_record() {
        let store = InMemoryTableStore::new();
        let record = inventory_record("SKU-001", Version::first(), 100);

        let version = store
            .save(record, SaveOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let loaded = store.load("inventory", "SKU-001").await.unwrap().unwrap();
        assert_eq!(loaded.payload["available"], 100);
        assert_eq!(loaded.version, Version::first());
    }

    #[tokio::test]
    async fn load_missing_record_returns_none() {
        let store = InMemoryTableStore::new();
        let result = store.load("inventory", "SKU-404").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryTableStore::new();
        store
            .save(
                inventory_record("SKU-001", Version::first(), 100),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();

        // Save again still expecting a new record
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
    async fn save_with_correct_expected_version_succeeds() {
        let store = InMemoryTableStore::new();
        store
            .save(
                inventory_record("SKU-001", Version::first(), 100),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();

        let result = store
            .save(
                inventory_record("SKU-001", Version::new(2), 90),
                SaveOptions::expect_version(Version::first()),
            )
            .await;

        assert_eq!(result.unwrap(), Version::new(2));
    }

    #[tokio::test]
    async fn version_regression_is_rejected() {
        let store = InMemoryTableStore::new();
        store
            .save(
                inventory_record("SKU-001", Version::new(3), 100),
                SaveOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .save(
                inventory_record("SKU-001", Version::new(2), 90),
                SaveOptions::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(TableStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn load_all_applies_filter_and_limit() {
        let store = InMemoryTableStore::new();
        for (key, available) in [("SKU-001", 100), ("SKU-002", 0), ("SKU-003", 100)] {
            store
                .save(
                    inventory_record(key, Version::first(), available),
                    SaveOptions::expect_new(),
                )
                .await
                .unwrap();
        }

        let full = store
            .load_all(
                "inventory",
                RecordFilter::new().field_equals("available", serde_json::json!(100)),
            )
            .await
            .unwrap();
        assert_eq!(full.len(), 2);

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
    async fn patch_merges_payload_by_field() {
        let store = InMemoryTableStore::new();
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
    async fn patch_by_key_addresses_record_key() {
        let store = InMemoryTableStore::new();
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
                &serde_json::json!({"available": 50}),
            )
            .await
            .unwrap();
        assert_eq!(patched, 1);

        let record = store.load("inventory", "SKU-001").await.unwrap().unwrap();
        assert_eq!(record.payload["available"], 50);
    }

    #[tokio::test]
    async fn patch_unknown_target_patches_nothing() {
        let store = InMemoryTableStore::new();
        let patched = store
            .patch(
                "inventory",
                "sku",
                &serde_json::json!("SKU-404"),
                &serde_json::json!({"reserved": 1}),
            )
            .await
            .unwrap();
        assert_eq!(patched, 0);
    }

    #[tokio::test]
    async fn delete_by_id_removes_matching_records() {
        let store = InMemoryTableStore::new();
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
        assert_eq!(store.record_count().await, 1);
        assert!(store.load("inventory", "SKU-001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn typed_state_roundtrip_via_ext() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Counters {
            available: u32,
            reserved: u32,
        }

        let store = InMemoryTableStore::new();
        let state = Counters {
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

    #[tokio::test]
    async fn exists_reflects_saved_records() {
        let store = InMemoryTableStore::new();
        assert!(!store.exists("inventory", "SKU-001").await.unwrap());

        store
            .save(
                inventory_record("SKU-001", Version::first(), 100),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
        assert!(store.exists("inventory", "SKU-001").await.unwrap());
    }
}

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::{Record, RecordFilter, Result, TableStoreError, Version};

/// Options for saving a record.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Expected current version of the record for optimistic concurrency
    /// control. If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl SaveOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the record to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the record to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for table store implementations.
///
/// A table store persists versioned JSON records addressed by entity type
/// and key. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Loads a single record by entity type and key.
    ///
    /// Returns None if no record exists.
    async fn load(&self, entity: &str, key: &str) -> Result<Option<Record>>;

    /// Loads all records of an entity type matching the filter.
    ///
    /// Records are returned ordered by update time, then key.
    async fn load_all(&self, entity: &str, filter: RecordFilter) -> Result<Vec<Record>>;

    /// Saves a record, inserting or replacing it.
    ///
    /// The record's `version` is the version after this save. If
    /// `options.expected_version` is set, the operation fails with
    /// `ConcurrencyConflict` when the stored version doesn't match.
    ///
    /// Returns the new version of the record.
    async fn save(&self, record: Record, options: SaveOptions) -> Result<Version>;

    /// Merges `partial` into the payload of every record of `entity` whose
    /// `key_field` equals `key_value`.
    ///
    /// A `key_field` of `"key"` addresses the record key itself; any other
    /// value addresses a top-level payload field. Patched records get their
    /// version bumped. Returns the number of records patched.
    async fn patch(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
        partial: &serde_json::Value,
    ) -> Result<u64>;

    /// Deletes every record of `entity` whose `key_field` equals `key_value`.
    ///
    /// Key addressing works as in [`TableStore::patch`]. Returns the number
    /// of records removed.
    async fn delete_by_id(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
    ) -> Result<u64>;
}

/// Extension trait providing convenience methods for table stores.
#[async_trait]
pub trait TableStoreExt: TableStore {
    /// Returns true if a record exists for the entity/key pair.
    async fn exists(&self, entity: &str, key: &str) -> Result<bool> {
        Ok(self.load(entity, key).await?.is_some())
    }

    /// Loads a record and deserializes its payload, returning the stored
    /// version alongside the state.
    async fn load_state<T: DeserializeOwned + Send>(
        &self,
        entity: &str,
        key: &str,
    ) -> Result<Option<(T, Version)>> {
        match self.load(entity, key).await? {
            Some(record) => {
                let state = record.to_state()?;
                Ok(Some((state, record.version)))
            }
            None => Ok(None),
        }
    }

    /// Serializes `state` and saves it under the entity/key pair, expecting
    /// the stored record to be at `current` version.
    async fn save_state<T: Serialize + Sync>(
        &self,
        entity: &str,
        key: &str,
        current: Version,
        state: &T,
    ) -> Result<Version> {
        let record = Record::from_state(entity, key, current.next(), state)?;
        let options = if current == Version::initial() {
            SaveOptions::expect_new()
        } else {
            SaveOptions::expect_version(current)
        };
        self.save(record, options).await
    }

    /// Loads a record, failing with `RecordNotFound` when it doesn't exist.
    async fn require(&self, entity: &str, key: &str) -> Result<Record> {
        self.load(entity, key)
            .await?
            .ok_or_else(|| TableStoreError::RecordNotFound {
                entity: entity.to_string(),
                key: key.to_string(),
            })
    }
}

// Blanket implementation for all TableStore implementations
impl<T: TableStore + ?Sized> TableStoreExt for T {}

/// Merges the fields of a partial JSON object into a payload in place.
///
/// Non-object payloads or partials are replaced wholesale, matching the
/// shallow-merge semantics of the remote table API.
pub fn merge_partial(payload: &mut serde_json::Value, partial: &serde_json::Value) {
    match (payload.as_object_mut(), partial.as_object()) {
        (Some(target), Some(fields)) => {
            for (field, value) in fields {
                target.insert(field.clone(), value.clone());
            }
        }
        _ => *payload = partial.clone(),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Version number for a stored record, used for optimistic concurrency
/// control.
///
/// Versions start at 1 when a record is first saved and increment by 1 on
/// every subsequent save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a record that has never been saved.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first save.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored record: a JSON payload addressed by entity type and key.
///
/// This is the envelope the table API exchanges for every entity the core
/// persists (orders, inventory records, allocation history rows, client
/// product mappings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// The entity type this record belongs to (e.g., "orders", "inventory").
    pub entity: String,

    /// The record's primary key within its entity type.
    pub key: String,

    /// The version of the record after this save.
    pub version: Version,

    /// When the record was last written.
    pub updated_at: DateTime<Utc>,

    /// The record payload as JSON.
    pub payload: serde_json::Value,
}

impl Record {
    /// Creates a new record builder.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Serializes `state` into a record for the given entity and key.
    pub fn from_state<T: Serialize>(
        entity: impl Into<String>,
        key: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            entity: entity.into(),
            key: key.into(),
            version,
            updated_at: Utc::now(),
            payload: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the payload into a typed value.
    pub fn to_state<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing records.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    entity: Option<String>,
    key: Option<String>,
    version: Option<Version>,
    updated_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl RecordBuilder {
    /// Sets the entity type.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Sets the record key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the update timestamp. If not set, the current time will be used.
    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if required fields (entity, key, version, payload) are not set.
    pub fn build(self) -> Record {
        Record {
            entity: self.entity.expect("entity is required"),
            key: self.key.expect("key is required"),
            version: self.version.expect("version is required"),
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            payload: self.payload.expect("payload is required"),
        }
    }

    /// Tries to build the record, returning None if required fields are
    /// missing.
    pub fn try_build(self) -> Option<Record> {
        Some(Record {
            entity: self.entity?,
            key: self.key?,
            version: self.version?,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            payload: self.payload?,
        })
    }
}

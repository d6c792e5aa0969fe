use chrono::{DateTime, Utc};

use crate::Record;

/// Filter for `load_all` queries against one entity type.
///
/// Field clauses match against top-level payload fields. Range, limit, and
/// offset clauses are applied by the store after filtering.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Payload fields that must equal the given JSON values.
    pub field_equals: Vec<(String, serde_json::Value)>,

    /// Only records updated at or after this time.
    pub updated_after: Option<DateTime<Utc>>,

    /// Only records updated at or before this time.
    pub updated_before: Option<DateTime<Utc>>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,

    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl RecordFilter {
    /// Creates an empty filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload-field equality clause.
    pub fn field_equals(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.field_equals.push((field.into(), value));
        self
    }

    /// Restricts to records updated at or after `time`.
    pub fn updated_after(mut self, time: DateTime<Utc>) -> Self {
        self.updated_after = Some(time);
        self
    }

    /// Restricts to records updated at or before `time`.
    pub fn updated_before(mut self, time: DateTime<Utc>) -> Self {
        self.updated_before = Some(time);
        self
    }

    /// Limits the number of records returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` records.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the record satisfies every field and timestamp clause.
    ///
    /// Limit and offset are not evaluated here; the store applies them after
    /// collecting matches.
    pub fn matches(&self, record: &Record) -> bool {
        for (field, value) in &self.field_equals {
            if record.payload.get(field) != Some(value) {
                return false;
            }
        }
        if let Some(after) = self.updated_after
            && record.updated_at < after
        {
            return false;
        }
        if let Some(before) = self.updated_before
            && record.updated_at > before
        {
            return false;
        }
        true
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Record, RecordFilter, Result, TableStoreError, Version,
    store::{SaveOptions, TableStore},
};

/// PostgreSQL-backed table store implementation.
#[derive(Clone)]
pub struct PostgresTableStore {
    pool: PgPool,
}

impl PostgresTableStore {
    /// Creates a new PostgreSQL table store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<Record> {
        Ok(Record {
            entity: row.try_get("entity")?,
            key: row.try_get("key")?,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

/// Renders a JSON key value as the text form used for record-key matching.
fn key_value_text(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[async_trait]
impl TableStore for PostgresTableStore {
    async fn load(&self, entity: &str, key: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            r#"
            SELECT entity, key, version, updated_at, payload
            FROM records
            WHERE entity = $1 AND key = $2
            "#,
        )
        .bind(entity)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn load_all(&self, entity: &str, filter: RecordFilter) -> Result<Vec<Record>> {
        let mut sql = String::from(
            "SELECT entity, key, version, updated_at, payload FROM records WHERE entity = $1",
        );
        let mut param_count = 1;

        // Build dynamic query
        for _ in &filter.field_equals {
            param_count += 1;
            sql.push_str(&format!(" AND payload @> ${param_count}"));
        }
        if filter.updated_after.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND updated_at >= ${param_count}"));
        }
        if filter.updated_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND updated_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY updated_at ASC, key ASC");

        if filter.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if filter.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql).bind(entity);

        for (field, value) in &filter.field_equals {
            let containment = serde_json::json!({ field.as_str(): value });
            sqlx_query = sqlx_query.bind(containment);
        }
        if let Some(after) = filter.updated_after {
            sqlx_query = sqlx_query.bind(after);
        }
        if let Some(before) = filter.updated_before {
            sqlx_query = sqlx_query.bind(before);
        }
        if let Some(limit) = filter.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn save(&self, record: Record, options: SaveOptions) -> Result<Version> {
        // Start a transaction
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM records WHERE entity = $1 AND key = $2 FOR UPDATE")
                .bind(&record.entity)
                .bind(&record.key)
                .fetch_optional(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        // Check expected version if specified
        if let Some(expected) = options.expected_version
            && actual != expected
        {
            return Err(TableStoreError::ConcurrencyConflict {
                entity: record.entity,
                key: record.key,
                expected,
                actual,
            });
        }

        // Check for version regressions
        if record.version <= actual && actual != Version::initial() {
            return Err(TableStoreError::ConcurrencyConflict {
                entity: record.entity,
                key: record.key,
                expected: options.expected_version.unwrap_or(actual),
                actual,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO records (entity, key, version, updated_at, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (entity, key) DO UPDATE SET
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(&record.entity)
        .bind(&record.key)
        .bind(record.version.as_i64())
        .bind(record.updated_at)
        .bind(&record.payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            entity = %record.entity,
            key = %record.key,
            version = %record.version,
            "record saved"
        );
        Ok(record.version)
    }

    async fn patch(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
        partial: &serde_json::Value,
    ) -> Result<u64> {
        let result = if key_field == "key" {
            sqlx::query(
                r#"
                UPDATE records
                SET payload = payload || $3, version = version + 1, updated_at = NOW()
                WHERE entity = $1 AND key = $2
                "#,
            )
            .bind(entity)
            .bind(key_value_text(key_value))
            .bind(partial)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE records
                SET payload = payload || $4, version = version + 1, updated_at = NOW()
                WHERE entity = $1 AND payload -> $2 = $3
                "#,
            )
            .bind(entity)
            .bind(key_field)
            .bind(key_value)
            .bind(partial)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected())
    }

    async fn delete_by_id(
        &self,
        entity: &str,
        key_field: &str,
        key_value: &serde_json::Value,
    ) -> Result<u64> {
        let result = if key_field == "key" {
            sqlx::query("DELETE FROM records WHERE entity = $1 AND key = $2")
                .bind(entity)
                .bind(key_value_text(key_value))
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("DELETE FROM records WHERE entity = $1 AND payload -> $2 = $3")
                .bind(entity)
                .bind(key_field)
                .bind(key_value)
                .execute(&self.pool)
                .await?
        };

        Ok(result.rows_affected())
    }
}

//! Post-commit hooks.
//!
//! The source system patched a downstream client-product reservation counter
//! as a side effect of recording an allocation. Here that cascade is an
//! explicit hook list the coordinator invokes after a movement has
//! committed, so cross-aggregate consistency lives in one visible place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{LineId, OrderId, Sku};
use serde::{Deserialize, Serialize};
use table_store::TableStore;

use crate::error::FulfillmentError;
use crate::tables::CLIENT_PRODUCTS_TABLE;

/// The kind of quantity movement a commit represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    /// Quantity moved from available to reserved.
    Allocated,

    /// A reservation was consumed by shipping.
    Dispatched,

    /// Dispatched quantity was confirmed delivered.
    Delivered,

    /// A reservation was released back to available.
    Released,
}

/// A committed fulfillment movement, handed to post-commit hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentCommit {
    /// The order the movement belongs to.
    pub order_id: OrderId,

    /// The line the quantity moved on.
    pub line_id: LineId,

    /// The SKU involved.
    pub sku: Sku,

    /// What kind of movement committed.
    pub kind: CommitKind,

    /// How much quantity moved.
    pub quantity: u32,

    /// When the movement committed.
    pub at: DateTime<Utc>,
}

impl FulfillmentCommit {
    /// Creates a commit notification stamped with the current time.
    pub fn new(
        order_id: OrderId,
        line_id: LineId,
        sku: Sku,
        kind: CommitKind,
        quantity: u32,
    ) -> Self {
        Self {
            order_id,
            line_id,
            sku,
            kind,
            quantity,
            at: Utc::now(),
        }
    }
}

/// Hook invoked after a fulfillment movement has committed.
///
/// Hooks observe committed movements; they cannot veto them. A failing hook
/// is logged and counted, and the primary mutation stands.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Called once per committed movement.
    async fn after_commit(&self, commit: &FulfillmentCommit) -> Result<(), FulfillmentError>;
}

/// Mirrors reservation changes onto the downstream client-product records.
///
/// Allocations raise the `reserved_quantity` counter on the matching
/// `client_products` row; dispatches and releases lower it. Rows are matched
/// by their `sku` payload field through the table API's patch operation. A
/// SKU with no client-product row is skipped.
pub struct ReservedQuantityCascade<S: TableStore> {
    store: S,
}

impl<S: TableStore> ReservedQuantityCascade<S> {
    /// Creates a cascade writing through the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: TableStore> PostCommitHook for ReservedQuantityCascade<S> {
    fn name(&self) -> &'static str {
        "reserved_quantity_cascade"
    }

    async fn after_commit(&self, commit: &FulfillmentCommit) -> Result<(), FulfillmentError> {
        let delta: i64 = match commit.kind {
            CommitKind::Allocated => commit.quantity as i64,
            CommitKind::Dispatched | CommitKind::Released => -(commit.quantity as i64),
            CommitKind::Delivered => return Ok(()),
        };

        let Some(record) = self
            .store
            .load(CLIENT_PRODUCTS_TABLE, commit.sku.as_str())
            .await?
        else {
            tracing::debug!(sku = %commit.sku, "no client product row to cascade to");
            return Ok(());
        };

        let current = record.payload["reserved_quantity"].as_i64().unwrap_or(0);
        let updated = (current + delta).max(0);

        self.store
            .patch(
                CLIENT_PRODUCTS_TABLE,
                "sku",
                &serde_json::json!(commit.sku.as_str()),
                &serde_json::json!({ "reserved_quantity": updated }),
            )
            .await?;

        tracing::debug!(
            sku = %commit.sku,
            reserved_quantity = updated,
            "cascaded reservation change to client products"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_store::{InMemoryTableStore, Record, SaveOptions, Version};

    async fn seeded_store(sku: &str, reserved_quantity: i64) -> InMemoryTableStore {
        let store = InMemoryTableStore::new();
        let record = Record::builder()
            .entity(CLIENT_PRODUCTS_TABLE)
            .key(sku)
            .version(Version::first())
            .payload_raw(serde_json::json!({
                "sku": sku,
                "client": "Acme Beverages",
                "reserved_quantity": reserved_quantity,
            }))
            .build();
        store.save(record, SaveOptions::expect_new()).await.unwrap();
        store
    }

    fn commit(kind: CommitKind, quantity: u32) -> FulfillmentCommit {
        FulfillmentCommit::new(
            OrderId::new(),
            LineId::new(),
            Sku::new("SKU-500ML"),
            kind,
            quantity,
        )
    }

    #[tokio::test]
    async fn allocation_raises_downstream_counter() {
        let store = seeded_store("SKU-500ML", 10).await;
        let cascade = ReservedQuantityCascade::new(store.clone());

        cascade
            .after_commit(&commit(CommitKind::Allocated, 300))
            .await
            .unwrap();

        let record = store
            .load(CLIENT_PRODUCTS_TABLE, "SKU-500ML")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload["reserved_quantity"], 310);
        // Untouched fields survive the patch
        assert_eq!(record.payload["client"], "Acme Beverages");
    }

    #[tokio::test]
    async fn dispatch_lowers_downstream_counter() {
        let store = seeded_store("SKU-500ML", 300).await;
        let cascade = ReservedQuantityCascade::new(store.clone());

        cascade
            .after_commit(&commit(CommitKind::Dispatched, 120))
            .await
            .unwrap();

        let record = store
            .load(CLIENT_PRODUCTS_TABLE, "SKU-500ML")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload["reserved_quantity"], 180);
    }

    #[tokio::test]
    async fn counter_never_goes_negative() {
        let store = seeded_store("SKU-500ML", 50).await;
        let cascade = ReservedQuantityCascade::new(store.clone());

        cascade
            .after_commit(&commit(CommitKind::Released, 80))
            .await
            .unwrap();

        let record = store
            .load(CLIENT_PRODUCTS_TABLE, "SKU-500ML")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload["reserved_quantity"], 0);
    }

    #[tokio::test]
    async fn delivery_has_no_downstream_effect() {
        let store = seeded_store("SKU-500ML", 100).await;
        let cascade = ReservedQuantityCascade::new(store.clone());

        cascade
            .after_commit(&commit(CommitKind::Delivered, 100))
            .await
            .unwrap();

        let record = store
            .load(CLIENT_PRODUCTS_TABLE, "SKU-500ML")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload["reserved_quantity"], 100);
    }

    #[tokio::test]
    async fn missing_row_is_skipped() {
        let store = InMemoryTableStore::new();
        let cascade = ReservedQuantityCascade::new(store.clone());

        let result = cascade
            .after_commit(&commit(CommitKind::Allocated, 10))
            .await;
        assert!(result.is_ok());
        assert_eq!(store.record_count().await, 0);
    }
}

//! Order persistence through the table store.

use common::OrderId;
use table_store::{Record, RecordFilter, SaveOptions, TableStore, Version};

use crate::error::DomainError;
use crate::order::Order;

/// Entity type under which orders are stored.
pub const ORDERS_TABLE: &str = "orders";

/// Loads and saves [`Order`] aggregates against the table store.
///
/// Saves carry the aggregate's current version as the optimistic-concurrency
/// expectation; a lost race surfaces as a store conflict rather than a silent
/// overwrite.
pub struct OrderRepository<S: TableStore> {
    store: S,
}

impl<S: TableStore> OrderRepository<S> {
    /// Creates a new repository backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        let Some(record) = self.store.load(ORDERS_TABLE, &order_id.to_string()).await? else {
            return Ok(None);
        };
        let mut order: Order = record.to_state()?;
        order.set_version(record.version);
        Ok(Some(order))
    }

    /// Loads an order by ID, failing when it doesn't exist.
    pub async fn get(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.load(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Loads every stored order.
    #[tracing::instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<Order>, DomainError> {
        let records = self
            .store
            .load_all(ORDERS_TABLE, RecordFilter::new())
            .await?;

        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            let mut order: Order = record.to_state()?;
            order.set_version(record.version);
            orders.push(order);
        }
        Ok(orders)
    }

    /// Persists the order, advancing its version on success.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn save(&self, order: &mut Order) -> Result<Version, DomainError> {
        let current = order.version();
        let record = Record::from_state(
            ORDERS_TABLE,
            order.id().to_string(),
            current.next(),
            order,
        )?;

        let options = if current == Version::initial() {
            SaveOptions::expect_new()
        } else {
            SaveOptions::expect_version(current)
        };

        let new_version = self.store.save(record, options).await?;
        order.set_version(new_version);
        Ok(new_version)
    }
}

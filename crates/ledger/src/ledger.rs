//! Ledger service: serialized counter movements persisted per SKU.

use std::time::Duration;

use common::{KeyedLocks, Sku};
use table_store::{Record, SaveOptions, TableStore, Version};

use crate::error::LedgerError;
use crate::record::InventoryRecord;

/// Entity type under which inventory records are stored.
pub const INVENTORY_TABLE: &str = "inventory";

/// Default bounded wait for a per-SKU critical section.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// The inventory ledger.
///
/// All stock-balance mutation funnels through this service. Each operation
/// acquires the SKU's critical section, loads the record, applies the checked
/// counter movement, and persists it before releasing the section, so no
/// intermediate state is observable for that SKU. Operations on different
/// SKUs proceed independently. Lock acquisition is bounded and fails with
/// [`LedgerError::Busy`] rather than waiting indefinitely.
pub struct InventoryLedger<S: TableStore> {
    store: S,
    locks: KeyedLocks<Sku>,
}

impl<S: TableStore> InventoryLedger<S> {
    /// Creates a ledger with the default lock wait.
    pub fn new(store: S) -> Self {
        Self::with_lock_wait(store, DEFAULT_LOCK_WAIT)
    }

    /// Creates a ledger with a custom lock wait.
    pub fn with_lock_wait(store: S, wait: Duration) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(wait),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the inventory record for a SKU.
    ///
    /// Returns None if the SKU is unknown.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, sku: &Sku) -> Result<Option<InventoryRecord>, LedgerError> {
        let Some(record) = self.store.load(INVENTORY_TABLE, sku.as_str()).await? else {
            return Ok(None);
        };
        let mut state: InventoryRecord = record.to_state()?;
        state.set_version(record.version);
        Ok(Some(state))
    }

    /// Creates or replaces the inventory record for a SKU.
    ///
    /// Intended for seeding stock; counter movement goes through the verbs
    /// below.
    #[tracing::instrument(skip(self, record), fields(sku = %record.sku()))]
    pub async fn put(&self, record: InventoryRecord) -> Result<InventoryRecord, LedgerError> {
        let _section = self.acquire(record.sku()).await?;
        let mut state = record;
        if let Some(existing) = self.load(state.sku()).await? {
            state.set_version(existing.version());
        }
        self.persist(&mut state).await?;
        Ok(state)
    }

    /// Moves quantity from available to reserved.
    ///
    /// Fails with [`LedgerError::InsufficientStock`] when the free stock
    /// cannot cover the request; the record is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, sku: &Sku, quantity: u32) -> Result<InventoryRecord, LedgerError> {
        metrics::counter!("ledger_reservations_total").increment(1);
        let result = self
            .mutate(sku, |record| record.reserve(quantity))
            .await;
        if matches!(result, Err(LedgerError::InsufficientStock { .. })) {
            metrics::counter!("ledger_insufficient_stock_total").increment(1);
        }
        result
    }

    /// Reverses a reservation, returning quantity to available.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, sku: &Sku, quantity: u32) -> Result<InventoryRecord, LedgerError> {
        self.mutate(sku, |record| record.release(quantity)).await
    }

    /// Converts a reservation into a physical stock decrement.
    #[tracing::instrument(skip(self))]
    pub async fn consume(&self, sku: &Sku, quantity: u32) -> Result<InventoryRecord, LedgerError> {
        self.mutate(sku, |record| record.consume(quantity)).await
    }

    /// Adds free stock, creating the record when the SKU is new.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, sku: &Sku, quantity: u32) -> Result<InventoryRecord, LedgerError> {
        let _section = self.acquire(sku).await?;
        let mut state = match self.load(sku).await? {
            Some(state) => state,
            None => InventoryRecord::new(sku.clone(), 0),
        };
        state.restock(quantity);
        self.persist(&mut state).await?;
        tracing::info!(%sku, quantity, available = state.available(), "restocked");
        Ok(state)
    }

    /// Queues quantity into the production pipeline.
    #[tracing::instrument(skip(self))]
    pub async fn queue_production(
        &self,
        sku: &Sku,
        quantity: u32,
    ) -> Result<InventoryRecord, LedgerError> {
        self.mutate(sku, |record| {
            record.queue_production(quantity);
            Ok(())
        })
        .await
    }

    /// Completes production, moving quantity into free stock.
    #[tracing::instrument(skip(self))]
    pub async fn complete_production(
        &self,
        sku: &Sku,
        quantity: u32,
    ) -> Result<InventoryRecord, LedgerError> {
        self.mutate(sku, |record| record.complete_production(quantity))
            .await
    }

    /// Runs a checked counter movement inside the SKU's critical section.
    async fn mutate<F>(&self, sku: &Sku, movement: F) -> Result<InventoryRecord, LedgerError>
    where
        F: FnOnce(&mut InventoryRecord) -> Result<(), LedgerError>,
    {
        let _section = self.acquire(sku).await?;

        let mut state = self
            .load(sku)
            .await?
            .ok_or_else(|| LedgerError::SkuNotFound(sku.clone()))?;

        movement(&mut state)?;
        self.persist(&mut state).await?;

        tracing::debug!(
            %sku,
            available = state.available(),
            reserved = state.reserved(),
            "ledger counters updated"
        );
        Ok(state)
    }

    async fn acquire(
        &self,
        sku: &Sku,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>, LedgerError> {
        self.locks
            .acquire(sku)
            .await
            .map_err(|_| LedgerError::Busy(sku.clone()))
    }

    async fn load(&self, sku: &Sku) -> Result<Option<InventoryRecord>, LedgerError> {
        let Some(record) = self.store.load(INVENTORY_TABLE, sku.as_str()).await? else {
            return Ok(None);
        };
        let mut state: InventoryRecord = record.to_state()?;
        state.set_version(record.version);
        Ok(Some(state))
    }

    async fn persist(&self, state: &mut InventoryRecord) -> Result<(), LedgerError> {
        let current = state.version();
        let record = Record::from_state(
            INVENTORY_TABLE,
            state.sku().as_str(),
            current.next(),
            state,
        )?;
        let options = if current == Version::initial() {
            SaveOptions::expect_new()
        } else {
            SaveOptions::expect_version(current)
        };
        let new_version = self.store.save(record, options).await?;
        state.set_version(new_version);
        Ok(())
    }
}

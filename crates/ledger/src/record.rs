//! Per-SKU inventory counters.

use common::Sku;
use serde::{Deserialize, Serialize};
use table_store::Version;

use crate::error::LedgerError;

/// Inventory counters for one SKU.
///
/// `available` is free stock, `reserved` is committed to open order lines,
/// `in_production` has not arrived yet. Counters never go negative; every
/// mutation checks before it writes. Dispatch consumes a reservation rather
/// than releasing it: the stock physically leaves, `available` was already
/// decremented at reserve time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    sku: Sku,
    available: u32,
    reserved: u32,
    in_production: u32,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,
}

impl InventoryRecord {
    /// Creates a record with free stock and nothing reserved or queued.
    pub fn new(sku: impl Into<Sku>, available: u32) -> Self {
        Self {
            sku: sku.into(),
            available,
            reserved: 0,
            in_production: 0,
            version: Version::initial(),
        }
    }

    /// Creates a record with explicit counter values.
    pub fn with_counts(
        sku: impl Into<Sku>,
        available: u32,
        reserved: u32,
        in_production: u32,
    ) -> Self {
        Self {
            sku: sku.into(),
            available,
            reserved,
            in_production,
            version: Version::initial(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn in_production(&self) -> u32 {
        self.in_production
    }

    /// Physical stock still on hand (free plus reserved).
    pub fn on_hand(&self) -> u32 {
        self.available + self.reserved
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Moves quantity from available to reserved.
    pub(crate) fn reserve(&mut self, quantity: u32) -> Result<(), LedgerError> {
        if quantity > self.available {
            return Err(LedgerError::InsufficientStock {
                sku: self.sku.clone(),
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.reserved += quantity;
        Ok(())
    }

    /// Reverses a reservation, returning quantity to available.
    pub(crate) fn release(&mut self, quantity: u32) -> Result<(), LedgerError> {
        if quantity > self.reserved {
            return Err(LedgerError::InvalidState {
                sku: self.sku.clone(),
                operation: "release",
                requested: quantity,
                held: self.reserved,
            });
        }
        self.reserved -= quantity;
        self.available += quantity;
        Ok(())
    }

    /// Converts a reservation into a physical stock decrement.
    ///
    /// `available` is unaffected: it was already decremented at reserve time.
    pub(crate) fn consume(&mut self, quantity: u32) -> Result<(), LedgerError> {
        if quantity > self.reserved {
            return Err(LedgerError::InvalidState {
                sku: self.sku.clone(),
                operation: "consume",
                requested: quantity,
                held: self.reserved,
            });
        }
        self.reserved -= quantity;
        Ok(())
    }

    /// Adds free stock.
    pub(crate) fn restock(&mut self, quantity: u32) {
        self.available += quantity;
    }

    /// Queues quantity into the production pipeline.
    pub(crate) fn queue_production(&mut self, quantity: u32) {
        self.in_production += quantity;
    }

    /// Completes production, moving quantity into free stock.
    pub(crate) fn complete_production(&mut self, quantity: u32) -> Result<(), LedgerError> {
        if quantity > self.in_production {
            return Err(LedgerError::InvalidState {
                sku: self.sku.clone(),
                operation: "complete production of",
                requested: quantity,
                held: self.in_production,
            });
        }
        self.in_production -= quantity;
        self.available += quantity;
        Ok(())
    }
}

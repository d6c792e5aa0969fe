//! Ledger error types.

use common::Sku;
use table_store::TableStoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A reservation asked for more than the free stock.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: u32,
    },

    /// An operation asked for more than the counter it draws from holds.
    #[error("Invalid ledger state for {sku}: cannot {operation} {requested}, only {held} held")]
    InvalidState {
        sku: Sku,
        operation: &'static str,
        requested: u32,
        held: u32,
    },

    /// The SKU has no inventory record.
    #[error("Unknown SKU: {0}")]
    SkuNotFound(Sku),

    /// The per-SKU critical section could not be acquired in time.
    #[error("Ledger busy: timed out waiting for critical section of {0}")]
    Busy(Sku),

    /// Table store error.
    #[error("Table store error: {0}")]
    Store(#[from] TableStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Coordinator error types.

use common::OrderId;
use domain::{DomainError, OrderError};
use ledger::LedgerError;
use table_store::TableStoreError;
use thiserror::Error;

/// Errors that can occur while coordinating fulfillment commands.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Domain error (invalid transition, quantity bounds, persistence).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Ledger error (insufficient stock, reservation underflow, busy SKU).
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Table store error from the coordinator's own rows.
    #[error("Table store error: {0}")]
    Store(#[from] TableStoreError),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The per-order critical section could not be acquired in time.
    #[error("Fulfillment busy: timed out waiting for critical section of order {0}")]
    Busy(OrderId),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<OrderError> for FulfillmentError {
    fn from(e: OrderError) -> Self {
        FulfillmentError::Domain(DomainError::Order(e))
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

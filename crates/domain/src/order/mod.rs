//! Order aggregate and related types.

mod aggregate;
mod history;
mod line;
mod status;
mod value_objects;

pub use aggregate::{CancellationOutcome, Order, OrderDraft};
pub use common::{LineId, OrderId, Sku};
pub use history::{AuditEntry, AuditTrail};
pub use line::{LineDraft, LineReservation, OrderLine};
pub use status::{ApprovalDecision, LineStatus, OrderStatus, derive_order_status};
pub use value_objects::{Money, Priority};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Command is illegal in the current order status.
    #[error("Invalid transition: cannot {action} from {current_status} status")]
    InvalidTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Movement would break the ordered ≥ allocated ≥ dispatched ≥ delivered
    /// chain.
    #[error(
        "Quantity bounds violated on line {line_id}: {counter} would reach {requested}, limit {limit}"
    )]
    QuantityBounds {
        line_id: LineId,
        counter: &'static str,
        requested: u32,
        limit: u32,
    },

    /// Line not found on the order.
    #[error("Line not found: {line_id}")]
    LineNotFound { line_id: LineId },

    /// Line has been cancelled and accepts no further movements.
    #[error("Line {line_id} is cancelled")]
    LineCancelled { line_id: LineId },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Order has no lines.
    #[error("Order has no lines")]
    NoLines,
}

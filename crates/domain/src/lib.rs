//! Domain layer: the Order aggregate and its fulfillment state machines.
//!
//! An order owns its header fields, an append-only list of lines, and an
//! append-only audit trail. Order and line statuses are derived from the
//! quantity counters and the approval flag; every mutation goes through a
//! state-machine check, and nothing else writes a status field.

mod error;
pub mod order;
mod repository;

pub use error::DomainError;
pub use order::{
    ApprovalDecision, AuditEntry, AuditTrail, CancellationOutcome, LineDraft, LineId,
    LineReservation, LineStatus, Money, Order, OrderDraft, OrderError, OrderId, OrderLine,
    OrderStatus, Priority, Sku, derive_order_status,
};
pub use repository::{ORDERS_TABLE, OrderRepository};

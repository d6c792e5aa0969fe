//! Allocation coordinator.
//!
//! The only component allowed to move quantity between an order line and the
//! inventory ledger. Each command is atomic across both: the ledger movement
//! commits first inside its per-SKU critical section, the order commits
//! second under the per-order critical section, and a failed order commit
//! triggers the compensating ledger movement. Cross-aggregate side effects
//! run as explicit post-commit hooks.

mod commands;
mod coordinator;
mod error;
mod hooks;
mod tables;

pub use commands::{
    AllocateLine, ApproveOrder, CancelOrder, CreateOrder, DeliverLine, DispatchLine, RejectOrder,
};
pub use coordinator::FulfillmentCoordinator;
pub use error::{FulfillmentError, Result};
pub use hooks::{CommitKind, FulfillmentCommit, PostCommitHook, ReservedQuantityCascade};
pub use tables::{ALLOCATION_HISTORY_TABLE, CLIENT_PRODUCTS_TABLE};

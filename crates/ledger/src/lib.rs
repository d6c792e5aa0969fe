//! Inventory ledger.
//!
//! Owns the per-SKU available/reserved/in-production counters and is the
//! only component allowed to mutate stock balances. Every operation runs
//! inside a per-SKU critical section with a bounded wait, so reservation
//! math never interleaves for the same SKU while distinct SKUs proceed
//! independently.

mod error;
mod ledger;
mod record;

pub use error::LedgerError;
pub use ledger::{DEFAULT_LOCK_WAIT, INVENTORY_TABLE, InventoryLedger};
pub use record::InventoryRecord;

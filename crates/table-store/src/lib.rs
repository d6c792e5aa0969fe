//! Table-style persistence collaborator.
//!
//! The fulfillment core persists orders, inventory records, and allocation
//! history through a generic table API: versioned JSON records addressed by
//! entity type and key. Saves carry an optimistic-concurrency version check,
//! which is the backstop for any write that slips past the per-entity
//! critical sections.

mod error;
mod filter;
mod memory;
mod postgres;
mod record;
pub mod store;

pub use error::{Result, TableStoreError};
pub use filter::RecordFilter;
pub use memory::InMemoryTableStore;
pub use postgres::PostgresTableStore;
pub use record::{Record, RecordBuilder, Version};
pub use store::{SaveOptions, TableStore, TableStoreExt};

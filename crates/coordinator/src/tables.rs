//! Table names the coordinator persists to.

/// Audit entries are mirrored into this table, one row per entry.
pub const ALLOCATION_HISTORY_TABLE: &str = "allocation_history";

/// Downstream per-SKU reservation mapping patched by the reserved-quantity
/// cascade.
pub const CLIENT_PRODUCTS_TABLE: &str = "client_products";

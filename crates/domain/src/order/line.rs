//! Order lines and their quantity counters.

use common::{LineId, Sku};
use serde::{Deserialize, Serialize};

use super::{LineStatus, Money, OrderError};

/// Input for creating one line on a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    /// The SKU the line orders.
    pub sku: Sku,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,
}

impl LineDraft {
    /// Creates a new line draft.
    pub fn new(sku: impl Into<Sku>, quantity: u32, unit_price: Money) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_price,
        }
    }
}

/// A reservation held by one line, used when releasing stock on cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReservation {
    pub line_id: LineId,
    pub sku: Sku,
    pub quantity: u32,
}

/// One line of an order.
///
/// The ordered quantity is immutable once the order is created. The three
/// movement counters must satisfy `delivered ≤ dispatched ≤ allocated ≤
/// ordered` at all times; every mutation below enforces that chain and
/// refreshes the derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    id: LineId,
    sku: Sku,
    ordered: u32,
    unit_price: Money,
    allocated: u32,
    dispatched: u32,
    delivered: u32,
    cancelled: bool,
    status: LineStatus,
}

impl OrderLine {
    pub(crate) fn from_draft(draft: LineDraft) -> Self {
        Self {
            id: LineId::new(),
            sku: draft.sku,
            ordered: draft.quantity,
            unit_price: draft.unit_price,
            allocated: 0,
            dispatched: 0,
            delivered: 0,
            cancelled: false,
            status: LineStatus::Pending,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn ordered(&self) -> u32 {
        self.ordered
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn status(&self) -> LineStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Quantity reserved in the ledger but not yet dispatched.
    pub fn outstanding_reservation(&self) -> u32 {
        self.allocated - self.dispatched
    }

    /// Total price for this line (ordered quantity at unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.ordered)
    }

    pub(crate) fn ensure_allocatable(&self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_movement(quantity, self.allocated, self.ordered, "allocated")
    }

    pub(crate) fn ensure_dispatchable(&self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_movement(quantity, self.dispatched, self.allocated, "dispatched")
    }

    pub(crate) fn ensure_deliverable(&self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_movement(quantity, self.delivered, self.dispatched, "delivered")
    }

    fn ensure_movement(
        &self,
        quantity: u32,
        counter: u32,
        limit: u32,
        counter_name: &'static str,
    ) -> Result<(), OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }
        if self.cancelled {
            return Err(OrderError::LineCancelled { line_id: self.id });
        }
        let Some(requested) = counter.checked_add(quantity) else {
            return Err(OrderError::QuantityBounds {
                line_id: self.id,
                counter: counter_name,
                requested: u32::MAX,
                limit,
            });
        };
        if requested > limit {
            return Err(OrderError::QuantityBounds {
                line_id: self.id,
                counter: counter_name,
                requested,
                limit,
            });
        }
        Ok(())
    }

    pub(crate) fn record_allocation(&mut self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_allocatable(quantity)?;
        self.allocated += quantity;
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn record_dispatch(&mut self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_dispatchable(quantity)?;
        self.dispatched += quantity;
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn record_delivery(&mut self, quantity: u32) -> Result<(), OrderError> {
        self.ensure_deliverable(quantity)?;
        self.delivered += quantity;
        self.refresh_status();
        Ok(())
    }

    /// Flags the line cancelled and returns the reservation it was holding.
    ///
    /// Callers release the returned quantity back to the ledger. Only lines
    /// with no dispatched quantity may be cancelled.
    pub(crate) fn cancel(&mut self) -> u32 {
        let released = self.outstanding_reservation();
        self.cancelled = true;
        self.refresh_status();
        released
    }

    fn refresh_status(&mut self) {
        self.status = if self.cancelled {
            LineStatus::Cancelled
        } else if self.delivered == self.ordered {
            LineStatus::Delivered
        } else if self.dispatched == self.ordered {
            LineStatus::Dispatched
        } else if self.allocated == self.ordered {
            LineStatus::Ready
        } else {
            LineStatus::Pending
        };
    }
}

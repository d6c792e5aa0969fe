//! Fulfillment commands.

use common::{LineId, OrderId};
use domain::{LineDraft, OrderDraft};

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The order ID to create.
    pub order_id: OrderId,

    /// Header fields for the new order.
    pub draft: OrderDraft,

    /// Lines to create the order with.
    pub lines: Vec<LineDraft>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command with a generated order ID.
    pub fn new(draft: OrderDraft, lines: Vec<LineDraft>) -> Self {
        Self {
            order_id: OrderId::new(),
            draft,
            lines,
        }
    }
}

/// Command to approve an order.
#[derive(Debug, Clone)]
pub struct ApproveOrder {
    /// The order to approve.
    pub order_id: OrderId,

    /// Who approves it.
    pub actor: String,
}

impl ApproveOrder {
    /// Creates a new ApproveOrder command.
    pub fn new(order_id: OrderId, actor: impl Into<String>) -> Self {
        Self {
            order_id,
            actor: actor.into(),
        }
    }
}

/// Command to reject an order.
#[derive(Debug, Clone)]
pub struct RejectOrder {
    /// The order to reject.
    pub order_id: OrderId,

    /// Who rejects it.
    pub actor: String,

    /// Why the order was rejected.
    pub reason: String,
}

impl RejectOrder {
    /// Creates a new RejectOrder command.
    pub fn new(order_id: OrderId, actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            actor: actor.into(),
            reason: reason.into(),
        }
    }
}

/// Command to allocate inventory to one order line.
#[derive(Debug, Clone)]
pub struct AllocateLine {
    /// The order the line belongs to.
    pub order_id: OrderId,

    /// The line to allocate against.
    pub line_id: LineId,

    /// Quantity to move from available to reserved.
    pub quantity: u32,

    /// Who issues the allocation.
    pub actor: String,
}

impl AllocateLine {
    /// Creates a new AllocateLine command.
    pub fn new(
        order_id: OrderId,
        line_id: LineId,
        quantity: u32,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            line_id,
            quantity,
            actor: actor.into(),
        }
    }
}

/// Command to dispatch allocated stock on one order line.
#[derive(Debug, Clone)]
pub struct DispatchLine {
    /// The order the line belongs to.
    pub order_id: OrderId,

    /// The line to dispatch from.
    pub line_id: LineId,

    /// Quantity to ship.
    pub quantity: u32,

    /// Shipment tracking ID, recorded once when dispatch begins.
    pub tracking_id: Option<String>,

    /// Carrier, recorded once when dispatch begins.
    pub carrier: Option<String>,

    /// Who issues the dispatch.
    pub actor: String,
}

impl DispatchLine {
    /// Creates a new DispatchLine command without shipment details.
    pub fn new(
        order_id: OrderId,
        line_id: LineId,
        quantity: u32,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            line_id,
            quantity,
            tracking_id: None,
            carrier: None,
            actor: actor.into(),
        }
    }

    /// Attaches shipment details to the command.
    pub fn with_shipment(
        mut self,
        tracking_id: impl Into<String>,
        carrier: impl Into<String>,
    ) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self.carrier = Some(carrier.into());
        self
    }
}

/// Command to mark dispatched stock on one order line as delivered.
#[derive(Debug, Clone)]
pub struct DeliverLine {
    /// The order the line belongs to.
    pub order_id: OrderId,

    /// The line being delivered.
    pub line_id: LineId,

    /// Quantity confirmed delivered.
    pub quantity: u32,

    /// Who confirms the delivery.
    pub actor: String,
}

impl DeliverLine {
    /// Creates a new DeliverLine command.
    pub fn new(
        order_id: OrderId,
        line_id: LineId,
        quantity: u32,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            line_id,
            quantity,
            actor: actor.into(),
        }
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// The order to cancel.
    pub order_id: OrderId,

    /// Who cancels it.
    pub actor: String,

    /// Why the order was cancelled.
    pub reason: String,
}

impl CancelOrder {
    /// Creates a new CancelOrder command.
    pub fn new(order_id: OrderId, actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            actor: actor.into(),
            reason: reason.into(),
        }
    }
}

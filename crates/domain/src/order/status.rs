//! Order and line status machines.

use serde::{Deserialize, Serialize};

/// The status of an order in its fulfillment lifecycle.
///
/// Status transitions:
/// ```text
/// PendingApproval ──┬──► Approved ──► Ready / PartialFulfillment ──► Dispatched ──► Delivered
///                   │                        │
///                   └──► Rejected            └──► Cancelled
/// ```
///
/// This field is always derived from the approval decision plus the line
/// statuses (see [`derive_order_status`]); it is never set independently of
/// a valid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been placed and awaits an approval decision.
    #[default]
    PendingApproval,

    /// Order is approved; lines can be allocated against inventory.
    Approved,

    /// Every line is fully allocated and nothing has shipped yet.
    Ready,

    /// Some lines have progressed further (dispatched/delivered) than others.
    PartialFulfillment,

    /// Every active line has been fully dispatched.
    Dispatched,

    /// Every active line has been fully delivered (terminal state).
    Delivered,

    /// Order was rejected at the approval gate (terminal state).
    Rejected,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be approved in this status.
    pub fn can_approve(&self) -> bool {
        matches!(self, OrderStatus::PendingApproval)
    }

    /// Returns true if the order can be rejected in this status.
    pub fn can_reject(&self) -> bool {
        matches!(self, OrderStatus::PendingApproval)
    }

    /// Returns true if lines can be allocated in this status.
    pub fn can_allocate(&self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::PartialFulfillment)
    }

    /// Returns true if allocated stock can be dispatched in this status.
    pub fn can_dispatch(&self) -> bool {
        matches!(
            self,
            OrderStatus::Approved | OrderStatus::Ready | OrderStatus::PartialFulfillment
        )
    }

    /// Returns true if dispatched stock can be marked delivered in this status.
    pub fn can_deliver(&self) -> bool {
        matches!(
            self,
            OrderStatus::Approved
                | OrderStatus::Ready
                | OrderStatus::PartialFulfillment
                | OrderStatus::Dispatched
        )
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Approved | OrderStatus::Ready | OrderStatus::PartialFulfillment
        )
    }

    /// Returns true if this is a terminal status for the order as a whole.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::Ready => "ready",
            OrderStatus::PartialFulfillment => "partial_fulfillment",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single order line, derived from its quantity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Not yet fully allocated.
    #[default]
    Pending,

    /// Fully allocated, nothing dispatched.
    Ready,

    /// Fully dispatched.
    Dispatched,

    /// Fully delivered (terminal state).
    Delivered,

    /// Cancelled; any reservation was released (terminal state).
    Cancelled,
}

impl LineStatus {
    /// Returns true if this is a terminal status for the line.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LineStatus::Delivered | LineStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Pending => "pending",
            LineStatus::Ready => "ready",
            LineStatus::Dispatched => "dispatched",
            LineStatus::Delivered => "delivered",
            LineStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The approval decision recorded on the order header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// No decision yet.
    #[default]
    Pending,

    /// Order was approved for fulfillment.
    Approved,

    /// Order was rejected.
    Rejected,
}

/// Derives the order status from the approval decision and line statuses.
///
/// Precedence, highest first: rejection wins outright; all lines cancelled
/// means the order is cancelled; over the remaining active lines, full
/// delivery beats full dispatch, and any shipped quantity alongside earlier
/// lines is partial fulfillment; an order whose active lines are all ready
/// is ready; otherwise the status falls back to the approval decision.
///
/// A single dispatched line alongside pending lines therefore yields
/// `PartialFulfillment`, never `Dispatched`.
pub fn derive_order_status<I>(approval: ApprovalDecision, lines: I) -> OrderStatus
where
    I: IntoIterator<Item = LineStatus>,
{
    if approval == ApprovalDecision::Rejected {
        return OrderStatus::Rejected;
    }

    let base = if approval == ApprovalDecision::Approved {
        OrderStatus::Approved
    } else {
        OrderStatus::PendingApproval
    };

    let mut total = 0usize;
    let mut cancelled = 0usize;
    let mut delivered = 0usize;
    let mut dispatched = 0usize;
    let mut ready = 0usize;

    for status in lines {
        total += 1;
        match status {
            LineStatus::Cancelled => cancelled += 1,
            LineStatus::Delivered => delivered += 1,
            LineStatus::Dispatched => dispatched += 1,
            LineStatus::Ready => ready += 1,
            LineStatus::Pending => {}
        }
    }

    if total == 0 {
        return base;
    }
    if cancelled == total {
        return OrderStatus::Cancelled;
    }

    let active = total - cancelled;
    if delivered == active {
        return OrderStatus::Delivered;
    }
    if dispatched == active {
        return OrderStatus::Dispatched;
    }
    if dispatched + delivered > 0 {
        return OrderStatus::PartialFulfillment;
    }
    if ready == active {
        return OrderStatus::Ready;
    }

    base
}

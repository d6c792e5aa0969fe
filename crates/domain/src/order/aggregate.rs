//! Order aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{LineId, OrderId, Sku};
use serde::{Deserialize, Serialize};
use table_store::Version;

use super::{
    ApprovalDecision, AuditEntry, AuditTrail, LineDraft, LineReservation, OrderError, OrderStatus,
    Priority, line::OrderLine, status::derive_order_status,
};

/// Header fields supplied when an order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Customer the order is for.
    pub customer: String,

    /// External reference (customer PO number or similar).
    pub reference: String,

    /// Date the order was placed.
    pub order_date: NaiveDate,

    /// Requested delivery date, if any.
    pub delivery_date: Option<NaiveDate>,

    /// Fulfillment priority.
    pub priority: Priority,

    /// Who created the order.
    pub created_by: String,
}

impl OrderDraft {
    /// Creates a draft with today's order date and default priority.
    pub fn new(
        customer: impl Into<String>,
        reference: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            customer: customer.into(),
            reference: reference.into(),
            order_date: Utc::now().date_naive(),
            delivery_date: None,
            priority: Priority::default(),
            created_by: created_by.into(),
        }
    }

    /// Sets the fulfillment priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the requested delivery date.
    pub fn with_delivery_date(mut self, delivery_date: NaiveDate) -> Self {
        self.delivery_date = Some(delivery_date);
        self
    }

    /// Sets the order date.
    pub fn with_order_date(mut self, order_date: NaiveDate) -> Self {
        self.order_date = order_date;
        self
    }
}

/// Result of cancelling an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationOutcome {
    /// Reservations released by the cancellation, one per cancelled line
    /// that was holding stock.
    pub released: Vec<LineReservation>,

    /// True when every line ended up cancelled and the order is terminal.
    pub fully_cancelled: bool,
}

/// Order aggregate root.
///
/// Owns the header, the lines, and the audit trail. The status field is
/// derived: every mutation recomputes it from the approval decision and the
/// line statuses, so header state can never drift from line state. Commands
/// validate first and mutate second; a rejected command leaves the aggregate
/// untouched and writes no audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer: String,
    reference: String,
    order_date: NaiveDate,
    delivery_date: Option<NaiveDate>,
    priority: Priority,
    created_by: String,
    created_at: DateTime<Utc>,
    approval: ApprovalDecision,
    status: OrderStatus,
    tracking_id: Option<String>,
    carrier: Option<String>,
    lines: Vec<OrderLine>,
    history: AuditTrail,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,
}

impl Order {
    /// Creates a new order in `pending_approval` with all counters at zero.
    ///
    /// The ledger is untouched at creation time; allocation happens later
    /// through the coordinator.
    pub fn create(
        id: OrderId,
        draft: OrderDraft,
        lines: Vec<LineDraft>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        if let Some(invalid) = lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: invalid.quantity,
            });
        }

        let mut history = AuditTrail::new();
        history.append(AuditEntry::transition(
            draft.created_by.clone(),
            OrderStatus::PendingApproval,
            OrderStatus::PendingApproval,
            "order created",
        ));

        Ok(Self {
            id,
            customer: draft.customer,
            reference: draft.reference,
            order_date: draft.order_date,
            delivery_date: draft.delivery_date,
            priority: draft.priority,
            created_by: draft.created_by,
            created_at: Utc::now(),
            approval: ApprovalDecision::Pending,
            status: OrderStatus::PendingApproval,
            tracking_id: None,
            carrier: None,
            lines: lines.into_iter().map(OrderLine::from_draft).collect(),
            history,
            version: Version::initial(),
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn approval(&self) -> ApprovalDecision {
        self.approval
    }

    /// Current derived status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking_id(&self) -> Option<&str> {
        self.tracking_id.as_deref()
    }

    pub fn carrier(&self) -> Option<&str> {
        self.carrier.as_deref()
    }

    /// Returns all lines in creation order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns a line by ID.
    pub fn line(&self, line_id: LineId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.id() == line_id)
    }

    /// Returns the audit trail.
    pub fn history(&self) -> &AuditTrail {
        &self.history
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

// Command methods
impl Order {
    /// Approves the order. Legal only from `pending_approval`.
    pub fn approve(&mut self, actor: &str) -> Result<(), OrderError> {
        if !self.status.can_approve() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "approve",
            });
        }

        let from = self.status;
        self.approval = ApprovalDecision::Approved;
        self.recompute_status();
        self.history.append(AuditEntry::transition(
            actor,
            from,
            self.status,
            "order approved",
        ));
        Ok(())
    }

    /// Rejects the order. Legal only from `pending_approval`.
    pub fn reject(&mut self, actor: &str, reason: &str) -> Result<(), OrderError> {
        if !self.status.can_reject() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "reject",
            });
        }

        let from = self.status;
        self.approval = ApprovalDecision::Rejected;
        self.recompute_status();
        self.history.append(AuditEntry::transition(
            actor,
            from,
            self.status,
            format!("order rejected: {reason}"),
        ));
        Ok(())
    }

    /// Validates an allocation without mutating, returning the line's SKU.
    ///
    /// The coordinator reserves against the ledger between this check and
    /// [`Order::apply_allocation`].
    pub fn prepare_allocation(&self, line_id: LineId, quantity: u32) -> Result<Sku, OrderError> {
        if !self.status.can_allocate() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "allocate",
            });
        }
        let line = self.require_line(line_id)?;
        line.ensure_allocatable(quantity)?;
        Ok(line.sku().clone())
    }

    /// Moves quantity from ordered to allocated on a line.
    pub fn apply_allocation(
        &mut self,
        line_id: LineId,
        quantity: u32,
        actor: &str,
    ) -> Result<(), OrderError> {
        let sku = self.prepare_allocation(line_id, quantity)?;
        let from = self.status;
        self.require_line_mut(line_id)?.record_allocation(quantity)?;
        self.recompute_status();
        self.history.append(AuditEntry::line_movement(
            actor,
            from,
            self.status,
            format!("allocated {quantity} of {sku}"),
            line_id,
            quantity,
        ));
        Ok(())
    }

    /// Validates a dispatch without mutating, returning the line's SKU.
    pub fn prepare_dispatch(&self, line_id: LineId, quantity: u32) -> Result<Sku, OrderError> {
        if !self.status.can_dispatch() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "dispatch",
            });
        }
        let line = self.require_line(line_id)?;
        line.ensure_dispatchable(quantity)?;
        Ok(line.sku().clone())
    }

    /// Moves quantity from allocated to dispatched on a line.
    ///
    /// Tracking details are recorded the first time dispatch begins and are
    /// never overwritten afterwards.
    pub fn apply_dispatch(
        &mut self,
        line_id: LineId,
        quantity: u32,
        tracking_id: Option<String>,
        carrier: Option<String>,
        actor: &str,
    ) -> Result<(), OrderError> {
        let sku = self.prepare_dispatch(line_id, quantity)?;
        let from = self.status;
        self.require_line_mut(line_id)?.record_dispatch(quantity)?;
        if self.tracking_id.is_none() {
            self.tracking_id = tracking_id;
        }
        if self.carrier.is_none() {
            self.carrier = carrier;
        }
        self.recompute_status();
        self.history.append(AuditEntry::line_movement(
            actor,
            from,
            self.status,
            format!("dispatched {quantity} of {sku}"),
            line_id,
            quantity,
        ));
        Ok(())
    }

    /// Validates a delivery without mutating, returning the line's SKU.
    pub fn prepare_delivery(&self, line_id: LineId, quantity: u32) -> Result<Sku, OrderError> {
        if !self.status.can_deliver() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "deliver",
            });
        }
        let line = self.require_line(line_id)?;
        line.ensure_deliverable(quantity)?;
        Ok(line.sku().clone())
    }

    /// Moves quantity from dispatched to delivered on a line.
    ///
    /// No ledger effect: the stock already left at dispatch time.
    pub fn apply_delivery(
        &mut self,
        line_id: LineId,
        quantity: u32,
        actor: &str,
    ) -> Result<(), OrderError> {
        let sku = self.prepare_delivery(line_id, quantity)?;
        let from = self.status;
        self.require_line_mut(line_id)?.record_delivery(quantity)?;
        self.recompute_status();
        self.history.append(AuditEntry::line_movement(
            actor,
            from,
            self.status,
            format!("delivered {quantity} of {sku}"),
            line_id,
            quantity,
        ));
        Ok(())
    }

    /// Validates a cancellation without mutating, returning the reservations
    /// that would be released.
    ///
    /// Lines with dispatched quantity are excluded: their stock cannot be
    /// un-shipped.
    pub fn prepare_cancellation(&self) -> Result<Vec<LineReservation>, OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidTransition {
                current_status: self.status,
                action: "cancel",
            });
        }
        Ok(self
            .lines
            .iter()
            .filter(|line| !line.is_cancelled() && line.dispatched() == 0)
            .filter(|line| line.outstanding_reservation() > 0)
            .map(|line| LineReservation {
                line_id: line.id(),
                sku: line.sku().clone(),
                quantity: line.outstanding_reservation(),
            })
            .collect())
    }

    /// Cancels every line that has not shipped anything.
    ///
    /// Lines with dispatched or delivered quantity are left as-is and keep
    /// progressing; the order only reaches the terminal `cancelled` status
    /// when no such line exists.
    pub fn apply_cancellation(
        &mut self,
        actor: &str,
        reason: &str,
    ) -> Result<CancellationOutcome, OrderError> {
        // Re-runs the precondition so apply is safe on its own
        self.prepare_cancellation()?;

        let from = self.status;
        let mut released = Vec::new();
        for line in &mut self.lines {
            if line.is_cancelled() || line.dispatched() > 0 {
                continue;
            }
            let quantity = line.cancel();
            if quantity > 0 {
                released.push(LineReservation {
                    line_id: line.id(),
                    sku: line.sku().clone(),
                    quantity,
                });
            }
        }
        self.recompute_status();

        let fully_cancelled = self.status == OrderStatus::Cancelled;
        let note = if fully_cancelled {
            format!("order cancelled: {reason}")
        } else {
            format!("unshipped lines cancelled: {reason}")
        };
        self.history
            .append(AuditEntry::transition(actor, from, self.status, note));

        Ok(CancellationOutcome {
            released,
            fully_cancelled,
        })
    }

    /// Recomputes the derived status from the approval decision and line
    /// statuses.
    pub fn recompute_status(&mut self) {
        self.status =
            derive_order_status(self.approval, self.lines.iter().map(|line| line.status()));
    }

    fn require_line(&self, line_id: LineId) -> Result<&OrderLine, OrderError> {
        self.line(line_id)
            .ok_or(OrderError::LineNotFound { line_id })
    }

    fn require_line_mut(&mut self, line_id: LineId) -> Result<&mut OrderLine, OrderError> {
        self.lines
            .iter_mut()
            .find(|line| line.id() == line_id)
            .ok_or(OrderError::LineNotFound { line_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LineStatus, Money};

    fn two_line_order() -> Order {
        Order::create(
            OrderId::new(),
            OrderDraft::new("Acme Beverages", "PO-1042", "sales"),
            vec![
                LineDraft::new("SKU-500ML", 300, Money::from_cents(250)),
                LineDraft::new("SKU-1L", 200, Money::from_cents(400)),
            ],
        )
        .unwrap()
    }

    fn approved_order() -> Order {
        let mut order = two_line_order();
        order.approve("ops").unwrap();
        order
    }

    #[test]
    fn create_starts_pending_with_untouched_counters() {
        let order = two_line_order();
        assert_eq!(order.status(), OrderStatus::PendingApproval);
        assert_eq!(order.lines().len(), 2);
        for line in order.lines() {
            assert_eq!(line.allocated(), 0);
            assert_eq!(line.status(), LineStatus::Pending);
        }
        assert_eq!(order.history().len(), 1);
    }

    #[test]
    fn create_without_lines_fails() {
        let result = Order::create(
            OrderId::new(),
            OrderDraft::new("Acme", "PO-1", "sales"),
            vec![],
        );
        assert!(matches!(result, Err(OrderError::NoLines)));
    }

    #[test]
    fn create_with_zero_quantity_line_fails() {
        let result = Order::create(
            OrderId::new(),
            OrderDraft::new("Acme", "PO-1", "sales"),
            vec![LineDraft::new("SKU-500ML", 0, Money::from_cents(250))],
        );
        assert!(matches!(
            result,
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn approve_moves_to_approved_and_audits() {
        let mut order = two_line_order();
        order.approve("ops").unwrap();

        assert_eq!(order.status(), OrderStatus::Approved);
        let entry = order.history().last().unwrap();
        assert_eq!(entry.from_status, OrderStatus::PendingApproval);
        assert_eq!(entry.to_status, OrderStatus::Approved);
        assert_eq!(entry.actor, "ops");
    }

    #[test]
    fn approve_twice_fails_without_audit_entry() {
        let mut order = approved_order();
        let entries_before = order.history().len();

        let err = order.approve("ops").unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                current_status: OrderStatus::Approved,
                action: "approve",
            }
        ));
        assert_eq!(order.history().len(), entries_before);
    }

    #[test]
    fn reject_is_terminal() {
        let mut order = two_line_order();
        order.reject("ops", "credit hold").unwrap();

        assert_eq!(order.status(), OrderStatus::Rejected);
        assert!(order.is_terminal());

        let err = order.approve("ops").unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn allocation_requires_approval() {
        let order = two_line_order();
        let line_id = order.lines()[0].id();

        let err = order.prepare_allocation(line_id, 100).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                current_status: OrderStatus::PendingApproval,
                action: "allocate",
            }
        ));
    }

    #[test]
    fn full_allocation_of_one_line_keeps_order_approved() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();

        order.apply_allocation(l1, 300, "ops").unwrap();

        assert_eq!(order.lines()[0].status(), LineStatus::Ready);
        // Sibling line is still pending, so the order is not ready yet
        assert_eq!(order.status(), OrderStatus::Approved);
    }

    #[test]
    fn order_becomes_ready_once_all_lines_allocated() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        let l2 = order.lines()[1].id();

        order.apply_allocation(l1, 300, "ops").unwrap();
        order.apply_allocation(l2, 200, "ops").unwrap();

        assert_eq!(order.status(), OrderStatus::Ready);
    }

    #[test]
    fn dispatched_line_beside_pending_gives_partial_fulfillment() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();

        order.apply_allocation(l1, 300, "ops").unwrap();
        order
            .apply_dispatch(l1, 300, Some("TRK-1".into()), Some("DHL".into()), "ops")
            .unwrap();

        assert_eq!(order.lines()[0].status(), LineStatus::Dispatched);
        assert_eq!(order.status(), OrderStatus::PartialFulfillment);
        assert_eq!(order.tracking_id(), Some("TRK-1"));
        assert_eq!(order.carrier(), Some("DHL"));
    }

    #[test]
    fn tracking_details_are_set_only_once() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        let l2 = order.lines()[1].id();

        order.apply_allocation(l1, 300, "ops").unwrap();
        order.apply_allocation(l2, 200, "ops").unwrap();
        order
            .apply_dispatch(l1, 300, Some("TRK-1".into()), Some("DHL".into()), "ops")
            .unwrap();
        order
            .apply_dispatch(l2, 200, Some("TRK-2".into()), Some("UPS".into()), "ops")
            .unwrap();

        assert_eq!(order.tracking_id(), Some("TRK-1"));
        assert_eq!(order.carrier(), Some("DHL"));
    }

    #[test]
    fn over_dispatch_fails_and_changes_nothing() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        order.apply_allocation(l1, 200, "ops").unwrap();
        let entries_before = order.history().len();

        let err = order.apply_dispatch(l1, 300, None, None, "ops").unwrap_err();
        assert!(matches!(
            err,
            OrderError::QuantityBounds {
                counter: "dispatched",
                requested: 300,
                limit: 200,
                ..
            }
        ));
        assert_eq!(order.lines()[0].dispatched(), 0);
        assert_eq!(order.history().len(), entries_before);
    }

    #[test]
    fn full_lifecycle_reaches_delivered() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        let l2 = order.lines()[1].id();

        order.apply_allocation(l1, 300, "ops").unwrap();
        order.apply_allocation(l2, 200, "ops").unwrap();
        order.apply_dispatch(l1, 300, None, None, "ops").unwrap();
        order.apply_dispatch(l2, 200, None, None, "ops").unwrap();
        assert_eq!(order.status(), OrderStatus::Dispatched);

        order.apply_delivery(l1, 300, "driver").unwrap();
        assert_eq!(order.status(), OrderStatus::PartialFulfillment);

        order.apply_delivery(l2, 200, "driver").unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.is_terminal());
    }

    #[test]
    fn cancellation_before_dispatch_is_terminal() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        order.apply_allocation(l1, 300, "ops").unwrap();

        let outcome = order.apply_cancellation("ops", "customer withdrew").unwrap();

        assert!(outcome.fully_cancelled);
        assert_eq!(outcome.released.len(), 1);
        assert_eq!(outcome.released[0].quantity, 300);
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.lines().iter().all(OrderLine::is_cancelled));
    }

    #[test]
    fn cancellation_with_dispatched_line_spares_it() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        let l2 = order.lines()[1].id();

        order.apply_allocation(l1, 300, "ops").unwrap();
        order.apply_allocation(l2, 50, "ops").unwrap();
        order.apply_dispatch(l1, 300, None, None, "ops").unwrap();

        let outcome = order.apply_cancellation("ops", "remainder not needed").unwrap();

        assert!(!outcome.fully_cancelled);
        assert_eq!(outcome.released.len(), 1);
        assert_eq!(outcome.released[0].line_id, l2);
        assert_eq!(outcome.released[0].quantity, 50);

        assert_eq!(order.lines()[0].status(), LineStatus::Dispatched);
        assert_eq!(order.lines()[1].status(), LineStatus::Cancelled);
        assert_eq!(order.status(), OrderStatus::Dispatched);

        // The dispatched line can still be delivered
        order.apply_delivery(l1, 300, "driver").unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn cancel_from_pending_approval_fails() {
        let mut order = two_line_order();
        let err = order.apply_cancellation("ops", "n/a").unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                current_status: OrderStatus::PendingApproval,
                action: "cancel",
            }
        ));
    }

    #[test]
    fn line_not_found_is_reported() {
        let mut order = approved_order();
        let err = order.apply_allocation(LineId::new(), 10, "ops").unwrap_err();
        assert!(matches!(err, OrderError::LineNotFound { .. }));
    }

    #[test]
    fn every_successful_mutation_appends_history() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        let before = order.history().len();

        order.apply_allocation(l1, 100, "ops").unwrap();
        order.apply_allocation(l1, 200, "ops").unwrap();
        order.apply_dispatch(l1, 300, None, None, "ops").unwrap();

        assert_eq!(order.history().len(), before + 3);
        let entry = order.history().last().unwrap();
        assert_eq!(entry.line_id, Some(l1));
        assert_eq!(entry.quantity, Some(300));
    }

    #[test]
    fn serialization_roundtrip_preserves_state() {
        let mut order = approved_order();
        let l1 = order.lines()[0].id();
        order.apply_allocation(l1, 300, "ops").unwrap();

        let json = serde_json::to_string(&order).unwrap();
        let restored: Order = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, order);
        assert_eq!(restored.lines()[0].allocated(), 300);
        assert_eq!(restored.status(), OrderStatus::Approved);
    }
}

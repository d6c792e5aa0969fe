//! Append-only audit trail.

use chrono::{DateTime, Utc};
use common::LineId;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// A single immutable entry in an order's audit trail.
///
/// Entries are created only by state-machine-approved transitions and are
/// never mutated or deleted. A failed command produces no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the transition happened.
    pub at: DateTime<Utc>,

    /// Who issued the command.
    pub actor: String,

    /// Order status before the transition.
    pub from_status: OrderStatus,

    /// Order status after the transition.
    pub to_status: OrderStatus,

    /// Human-readable description of the transition.
    pub note: String,

    /// The line the transition touched, if any.
    pub line_id: Option<LineId>,

    /// The quantity that moved, if any.
    pub quantity: Option<u32>,
}

impl AuditEntry {
    /// Creates an entry for a header-level transition.
    pub fn transition(
        actor: impl Into<String>,
        from_status: OrderStatus,
        to_status: OrderStatus,
        note: impl Into<String>,
    ) -> Self {
        Self {
            at: Utc::now(),
            actor: actor.into(),
            from_status,
            to_status,
            note: note.into(),
            line_id: None,
            quantity: None,
        }
    }

    /// Creates an entry for a quantity movement on a specific line.
    pub fn line_movement(
        actor: impl Into<String>,
        from_status: OrderStatus,
        to_status: OrderStatus,
        note: impl Into<String>,
        line_id: LineId,
        quantity: u32,
    ) -> Self {
        Self {
            at: Utc::now(),
            actor: actor.into(),
            from_status,
            to_status,
            note: note.into(),
            line_id: Some(line_id),
            quantity: Some(quantity),
        }
    }
}

/// Ordered, append-only sequence of audit entries.
///
/// The only way to change a trail is to append to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditEntry>);

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry to the trail.
    pub fn append(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    /// Returns the entries in insertion order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    /// Returns the most recent entry.
    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the trail has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_entry_has_no_line_fields() {
        let entry = AuditEntry::transition(
            "ops",
            OrderStatus::PendingApproval,
            OrderStatus::Approved,
            "order approved",
        );
        assert_eq!(entry.actor, "ops");
        assert_eq!(entry.from_status, OrderStatus::PendingApproval);
        assert_eq!(entry.to_status, OrderStatus::Approved);
        assert!(entry.line_id.is_none());
        assert!(entry.quantity.is_none());
    }

    #[test]
    fn line_movement_entry_carries_line_and_quantity() {
        let line_id = LineId::new();
        let entry = AuditEntry::line_movement(
            "ops",
            OrderStatus::Approved,
            OrderStatus::Approved,
            "allocated 300 of SKU-500ML",
            line_id,
            300,
        );
        assert_eq!(entry.line_id, Some(line_id));
        assert_eq!(entry.quantity, Some(300));
    }

    #[test]
    fn trail_appends_in_order() {
        let mut trail = AuditTrail::new();
        assert!(trail.is_empty());

        trail.append(AuditEntry::transition(
            "ops",
            OrderStatus::PendingApproval,
            OrderStatus::Approved,
            "order approved",
        ));
        trail.append(AuditEntry::transition(
            "ops",
            OrderStatus::Approved,
            OrderStatus::Cancelled,
            "order cancelled: duplicate",
        ));

        assert_eq!(trail.len(), 2);
        assert_eq!(trail.entries()[0].to_status, OrderStatus::Approved);
        assert_eq!(trail.last().unwrap().to_status, OrderStatus::Cancelled);
    }

    #[test]
    fn trail_serialization_is_transparent() {
        let mut trail = AuditTrail::new();
        trail.append(AuditEntry::transition(
            "ops",
            OrderStatus::PendingApproval,
            OrderStatus::Approved,
            "order approved",
        ));

        let json = serde_json::to_value(&trail).unwrap();
        assert!(json.is_array());

        let restored: AuditTrail = serde_json::from_value(json).unwrap();
        assert_eq!(restored, trail);
    }
}

//! Fulfillment coordinator: commands across orders and the ledger.

use std::sync::Arc;
use std::time::Duration;

use common::{KeyedLocks, OrderId};
use domain::{AuditEntry, LineReservation, Order, OrderRepository};
use ledger::{DEFAULT_LOCK_WAIT, InventoryLedger};
use serde::Serialize;
use table_store::{Record, SaveOptions, TableStore, Version};

use crate::commands::{
    AllocateLine, ApproveOrder, CancelOrder, CreateOrder, DeliverLine, DispatchLine, RejectOrder,
};
use crate::error::{FulfillmentError, Result};
use crate::hooks::{CommitKind, FulfillmentCommit, PostCommitHook};
use crate::tables::ALLOCATION_HISTORY_TABLE;

/// Audit entry mirrored as a standalone allocation-history row.
#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    order_id: OrderId,
    seq: usize,
    #[serde(flatten)]
    entry: &'a AuditEntry,
}

/// Orchestrates fulfillment commands.
///
/// The coordinator is the sole entry point for every operation that moves
/// quantity on an order line, and the only caller of the ledger's movement
/// verbs. Commands are serialized per order through a bounded-wait critical
/// section; the ledger serializes per SKU internally. Lock order is always
/// order first, SKU second, so the two registries cannot deadlock.
///
/// A command either commits on both sides or on neither: the ledger movement
/// goes first, and if the order save fails afterwards the coordinator issues
/// the compensating ledger movement before surfacing the error.
pub struct FulfillmentCoordinator<S: TableStore + Clone> {
    store: S,
    orders: OrderRepository<S>,
    ledger: InventoryLedger<S>,
    locks: KeyedLocks<OrderId>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl<S: TableStore + Clone> FulfillmentCoordinator<S> {
    /// Creates a coordinator with the default lock wait.
    pub fn new(store: S) -> Self {
        Self::with_lock_wait(store, DEFAULT_LOCK_WAIT)
    }

    /// Creates a coordinator with a custom lock wait for both registries.
    pub fn with_lock_wait(store: S, wait: Duration) -> Self {
        Self {
            orders: OrderRepository::new(store.clone()),
            ledger: InventoryLedger::with_lock_wait(store.clone(), wait),
            locks: KeyedLocks::new(wait),
            hooks: Vec::new(),
            store,
        }
    }

    /// Registers a post-commit hook.
    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Returns the order repository.
    pub fn orders(&self) -> &OrderRepository<S> {
        &self.orders
    }

    /// Returns the inventory ledger.
    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Creates and persists a new order in `pending_approval`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order> {
        let mut order = Order::create(cmd.order_id, cmd.draft, cmd.lines)?;
        self.orders.save(&mut order).await?;
        self.record_history(&order).await;

        tracing::info!(lines = order.lines().len(), "order created");
        Ok(order)
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .load(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Loads every stored order.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.load_all().await?)
    }

    /// Approves an order. Legal only from `pending_approval`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn approve(&self, cmd: ApproveOrder) -> Result<Order> {
        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        order.approve(&cmd.actor)?;
        self.orders.save(&mut order).await?;
        self.record_history(&order).await;

        tracing::info!(actor = %cmd.actor, "order approved");
        Ok(order)
    }

    /// Rejects an order. Legal only from `pending_approval`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn reject(&self, cmd: RejectOrder) -> Result<Order> {
        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        order.reject(&cmd.actor, &cmd.reason)?;
        self.orders.save(&mut order).await?;
        self.record_history(&order).await;

        tracing::info!(actor = %cmd.actor, reason = %cmd.reason, "order rejected");
        Ok(order)
    }

    /// Allocates inventory to one order line.
    ///
    /// Reserves against the ledger first; on any failure after the
    /// reservation committed, the reservation is released again. Partial
    /// allocation (asking for less than the ordered remainder) is a normal,
    /// successful outcome.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, line_id = %cmd.line_id))]
    pub async fn allocate(&self, cmd: AllocateLine) -> Result<Order> {
        metrics::counter!("fulfillment_allocations_total").increment(1);
        let started = std::time::Instant::now();

        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        let sku = order.prepare_allocation(cmd.line_id, cmd.quantity)?;
        self.ledger.reserve(&sku, cmd.quantity).await?;

        let committed = async {
            order.apply_allocation(cmd.line_id, cmd.quantity, &cmd.actor)?;
            self.orders.save(&mut order).await?;
            Ok::<(), FulfillmentError>(())
        }
        .await;

        if let Err(e) = committed {
            // The reservation committed but the order did not: undo it
            if let Err(undo) = self.ledger.release(&sku, cmd.quantity).await {
                tracing::error!(%sku, error = %undo, "failed to undo reservation after order save failure");
            }
            return Err(e);
        }

        self.record_history(&order).await;
        self.notify_hooks(FulfillmentCommit::new(
            cmd.order_id,
            cmd.line_id,
            sku,
            CommitKind::Allocated,
            cmd.quantity,
        ))
        .await;

        metrics::histogram!("fulfillment_command_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(quantity = cmd.quantity, status = %order.status(), "line allocated");
        Ok(order)
    }

    /// Dispatches allocated stock on one order line.
    ///
    /// Consumes the reservation in the ledger: the stock physically leaves,
    /// `available` was already decremented at reserve time.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, line_id = %cmd.line_id))]
    pub async fn dispatch(&self, cmd: DispatchLine) -> Result<Order> {
        metrics::counter!("fulfillment_dispatches_total").increment(1);

        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        let sku = order.prepare_dispatch(cmd.line_id, cmd.quantity)?;
        self.ledger.consume(&sku, cmd.quantity).await?;

        let committed = async {
            order.apply_dispatch(
                cmd.line_id,
                cmd.quantity,
                cmd.tracking_id.clone(),
                cmd.carrier.clone(),
                &cmd.actor,
            )?;
            self.orders.save(&mut order).await?;
            Ok::<(), FulfillmentError>(())
        }
        .await;

        if let Err(e) = committed {
            // Put the consumed quantity back on the shelf and re-reserve it
            let undo = async {
                self.ledger.restock(&sku, cmd.quantity).await?;
                self.ledger.reserve(&sku, cmd.quantity).await?;
                Ok::<(), ledger::LedgerError>(())
            }
            .await;
            if let Err(undo_err) = undo {
                tracing::error!(%sku, error = %undo_err, "failed to undo consumption after order save failure");
            }
            return Err(e);
        }

        self.record_history(&order).await;
        self.notify_hooks(FulfillmentCommit::new(
            cmd.order_id,
            cmd.line_id,
            sku,
            CommitKind::Dispatched,
            cmd.quantity,
        ))
        .await;

        tracing::info!(quantity = cmd.quantity, status = %order.status(), "line dispatched");
        Ok(order)
    }

    /// Marks dispatched stock on one order line as delivered.
    ///
    /// No ledger effect: the stock already left on dispatch.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, line_id = %cmd.line_id))]
    pub async fn deliver(&self, cmd: DeliverLine) -> Result<Order> {
        metrics::counter!("fulfillment_deliveries_total").increment(1);

        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        let sku = order.prepare_delivery(cmd.line_id, cmd.quantity)?;
        order.apply_delivery(cmd.line_id, cmd.quantity, &cmd.actor)?;
        self.orders.save(&mut order).await?;

        self.record_history(&order).await;
        self.notify_hooks(FulfillmentCommit::new(
            cmd.order_id,
            cmd.line_id,
            sku,
            CommitKind::Delivered,
            cmd.quantity,
        ))
        .await;

        tracing::info!(quantity = cmd.quantity, status = %order.status(), "line delivered");
        Ok(order)
    }

    /// Cancels an order.
    ///
    /// Every line that has not shipped anything releases its reservation
    /// back to the ledger and is flagged cancelled. Lines with dispatched or
    /// delivered quantity are left as-is and keep progressing; the order is
    /// terminal only when no such line remains.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn cancel(&self, cmd: CancelOrder) -> Result<Order> {
        metrics::counter!("fulfillment_cancellations_total").increment(1);

        let _section = self.lock_order(cmd.order_id).await?;
        let mut order = self.get_order(cmd.order_id).await?;

        let releases = order.prepare_cancellation()?;

        let mut released: Vec<LineReservation> = Vec::new();
        for reservation in &releases {
            match self
                .ledger
                .release(&reservation.sku, reservation.quantity)
                .await
            {
                Ok(_) => released.push(reservation.clone()),
                Err(e) => {
                    self.reinstate(&released).await;
                    return Err(e.into());
                }
            }
        }

        let committed = async {
            let outcome = order.apply_cancellation(&cmd.actor, &cmd.reason)?;
            self.orders.save(&mut order).await?;
            Ok::<_, FulfillmentError>(outcome)
        }
        .await;

        let outcome = match committed {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reinstate(&released).await;
                return Err(e);
            }
        };

        self.record_history(&order).await;
        for reservation in &outcome.released {
            self.notify_hooks(FulfillmentCommit::new(
                cmd.order_id,
                reservation.line_id,
                reservation.sku.clone(),
                CommitKind::Released,
                reservation.quantity,
            ))
            .await;
        }

        tracing::info!(
            released_lines = outcome.released.len(),
            fully_cancelled = outcome.fully_cancelled,
            status = %order.status(),
            "order cancelled"
        );
        Ok(order)
    }

    async fn lock_order(
        &self,
        order_id: OrderId,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>> {
        self.locks
            .acquire(&order_id)
            .await
            .map_err(|_| FulfillmentError::Busy(order_id))
    }

    /// Re-reserves quantities whose release has to be rolled back.
    async fn reinstate(&self, releases: &[LineReservation]) {
        for reservation in releases {
            if let Err(e) = self
                .ledger
                .reserve(&reservation.sku, reservation.quantity)
                .await
            {
                tracing::error!(
                    sku = %reservation.sku,
                    quantity = reservation.quantity,
                    error = %e,
                    "failed to reinstate reservation after cancel failure"
                );
            }
        }
    }

    /// Mirrors the order's latest audit entry into the allocation-history
    /// table.
    ///
    /// The trail embedded in the order is authoritative; a failed mirror is
    /// logged and counted but does not fail the command.
    async fn record_history(&self, order: &Order) {
        let Some(entry) = order.history().last() else {
            return;
        };
        let seq = order.history().len();
        let row = HistoryRow {
            order_id: order.id(),
            seq,
            entry,
        };
        let key = format!("{}:{seq}", order.id());

        let record = match Record::from_state(ALLOCATION_HISTORY_TABLE, key, Version::first(), &row)
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(order_id = %order.id(), error = %e, "failed to serialize history row");
                return;
            }
        };

        if let Err(e) = self.store.save(record, SaveOptions::new()).await {
            metrics::counter!("fulfillment_history_write_failures_total").increment(1);
            tracing::warn!(order_id = %order.id(), error = %e, "failed to mirror audit entry");
        }
    }

    async fn notify_hooks(&self, commit: FulfillmentCommit) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_commit(&commit).await {
                metrics::counter!("fulfillment_hook_failures_total").increment(1);
                tracing::warn!(hook = hook.name(), error = %e, "post-commit hook failed");
            }
        }
    }
}

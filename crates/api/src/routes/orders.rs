//! Order command and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use common::{LineId, OrderId};
use coordinator::{
    AllocateLine, ApproveOrder, CancelOrder, CreateOrder, DeliverLine, DispatchLine,
    FulfillmentCoordinator, RejectOrder,
};
use domain::{LineDraft, Money, Order, OrderDraft, Priority};
use serde::{Deserialize, Serialize};
use table_store::TableStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: TableStore + Clone> {
    pub coordinator: FulfillmentCoordinator<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer: String,
    pub reference: String,
    pub priority: Option<Priority>,
    pub delivery_date: Option<NaiveDate>,
    pub created_by: Option<String>,
    pub lines: Vec<LineRequest>,
}

#[derive(Deserialize)]
pub struct LineRequest {
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor: Option<String>,
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    pub actor: Option<String>,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
    pub actor: Option<String>,
}

#[derive(Deserialize)]
pub struct DispatchRequest {
    pub quantity: u32,
    pub actor: Option<String>,
    pub tracking_id: Option<String>,
    pub carrier: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer: String,
    pub reference: String,
    pub order_date: String,
    pub delivery_date: Option<String>,
    pub priority: String,
    pub status: String,
    pub tracking_id: Option<String>,
    pub carrier: Option<String>,
    pub created_by: String,
    pub lines: Vec<LineResponse>,
}

#[derive(Serialize)]
pub struct LineResponse {
    pub id: String,
    pub sku: String,
    pub ordered: u32,
    pub allocated: u32,
    pub dispatched: u32,
    pub delivered: u32,
    pub status: String,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct AuditEntryResponse {
    pub at: String,
    pub actor: String,
    pub from_status: String,
    pub to_status: String,
    pub note: String,
    pub line_id: Option<String>,
    pub quantity: Option<u32>,
}

fn order_response(order: &Order) -> OrderResponse {
    OrderResponse {
        id: order.id().to_string(),
        customer: order.customer().to_string(),
        reference: order.reference().to_string(),
        order_date: order.order_date().to_string(),
        delivery_date: order.delivery_date().map(|date| date.to_string()),
        priority: order.priority().to_string(),
        status: order.status().to_string(),
        tracking_id: order.tracking_id().map(str::to_string),
        carrier: order.carrier().map(str::to_string),
        created_by: order.created_by().to_string(),
        lines: order
            .lines()
            .iter()
            .map(|line| LineResponse {
                id: line.id().to_string(),
                sku: line.sku().to_string(),
                ordered: line.ordered(),
                allocated: line.allocated(),
                dispatched: line.dispatched(),
                delivered: line.delivered(),
                status: line.status().to_string(),
                unit_price_cents: line.unit_price().cents(),
            })
            .collect(),
    }
}

fn actor_or_default(actor: Option<String>) -> String {
    actor.unwrap_or_else(|| "api".to_string())
}

// -- Handlers --

/// POST /orders — create a new order awaiting approval.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let mut draft = OrderDraft::new(
        req.customer,
        req.reference,
        actor_or_default(req.created_by),
    );
    if let Some(priority) = req.priority {
        draft = draft.with_priority(priority);
    }
    if let Some(delivery_date) = req.delivery_date {
        draft = draft.with_delivery_date(delivery_date);
    }

    let lines = req
        .lines
        .into_iter()
        .map(|line| {
            LineDraft::new(
                line.sku.as_str(),
                line.quantity,
                Money::from_cents(line.unit_price_cents),
            )
        })
        .collect();

    let order = state
        .coordinator
        .create_order(CreateOrder::new(draft, lines))
        .await?;

    let response = OrderCreatedResponse {
        order_id: order.id().to_string(),
        status: order.status().to_string(),
    };

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders — list all orders.
#[tracing::instrument(skip(state))]
pub async fn list<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_orders().await?;
    Ok(Json(orders.iter().map(order_response).collect()))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.get_order(order_id).await?;
    Ok(Json(order_response(&order)))
}

/// GET /orders/:id/history — the order's audit trail.
#[tracing::instrument(skip(state))]
pub async fn history<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEntryResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.get_order(order_id).await?;

    let entries = order
        .history()
        .entries()
        .iter()
        .map(|entry| AuditEntryResponse {
            at: entry.at.to_rfc3339(),
            actor: entry.actor.clone(),
            from_status: entry.from_status.to_string(),
            to_status: entry.to_status.to_string(),
            note: entry.note.clone(),
            line_id: entry.line_id.map(|line_id| line_id.to_string()),
            quantity: entry.quantity,
        })
        .collect();

    Ok(Json(entries))
}

/// POST /orders/:id/approve — approve a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn approve<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .approve(ApproveOrder::new(order_id, actor_or_default(req.actor)))
        .await?;
    Ok(Json(order_response(&order)))
}

/// POST /orders/:id/reject — reject a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn reject<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .reject(RejectOrder::new(
            order_id,
            actor_or_default(req.actor),
            req.reason,
        ))
        .await?;
    Ok(Json(order_response(&order)))
}

/// POST /orders/:id/cancel — cancel an order, releasing unshipped stock.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .cancel(CancelOrder::new(
            order_id,
            actor_or_default(req.actor),
            req.reason,
        ))
        .await?;
    Ok(Json(order_response(&order)))
}

/// POST /orders/:id/lines/:line_id/allocate — reserve stock for a line.
#[tracing::instrument(skip(state, req))]
pub async fn allocate<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let line_id = parse_line_id(&line_id)?;
    let order = state
        .coordinator
        .allocate(AllocateLine::new(
            order_id,
            line_id,
            req.quantity,
            actor_or_default(req.actor),
        ))
        .await?;
    Ok(Json(order_response(&order)))
}

/// POST /orders/:id/lines/:line_id/dispatch — ship allocated stock.
#[tracing::instrument(skip(state, req))]
pub async fn dispatch<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let line_id = parse_line_id(&line_id)?;

    let mut cmd = DispatchLine::new(
        order_id,
        line_id,
        req.quantity,
        actor_or_default(req.actor),
    );
    cmd.tracking_id = req.tracking_id;
    cmd.carrier = req.carrier;

    let order = state.coordinator.dispatch(cmd).await?;
    Ok(Json(order_response(&order)))
}

/// POST /orders/:id/lines/:line_id/deliver — confirm delivery.
#[tracing::instrument(skip(state, req))]
pub async fn deliver<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let line_id = parse_line_id(&line_id)?;
    let order = state
        .coordinator
        .deliver(DeliverLine::new(
            order_id,
            line_id,
            req.quantity,
            actor_or_default(req.actor),
        ))
        .await?;
    Ok(Json(order_response(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))?;
    Ok(OrderId::from(uuid))
}

fn parse_line_id(id: &str) -> Result<LineId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid line ID format: {e}")))?;
    Ok(LineId::from(uuid))
}

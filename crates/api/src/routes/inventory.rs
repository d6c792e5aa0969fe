//! Inventory query and stock-intake endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::Sku;
use ledger::InventoryRecord;
use serde::{Deserialize, Serialize};
use table_store::TableStore;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct InventoryResponse {
    pub sku: String,
    pub available: u32,
    pub reserved: u32,
    pub in_production: u32,
    pub on_hand: u32,
}

fn inventory_response(record: &InventoryRecord) -> InventoryResponse {
    InventoryResponse {
        sku: record.sku().to_string(),
        available: record.available(),
        reserved: record.reserved(),
        in_production: record.in_production(),
        on_hand: record.on_hand(),
    }
}

/// GET /inventory/:sku — current counters for a SKU.
#[tracing::instrument(skip(state))]
pub async fn get<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let sku = Sku::new(sku);
    let record = state
        .coordinator
        .ledger()
        .get(&sku)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Unknown SKU: {sku}")))?;
    Ok(Json(inventory_response(&record)))
}

/// POST /inventory/:sku/restock — add free stock.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let sku = Sku::new(sku);
    let record = state
        .coordinator
        .ledger()
        .restock(&sku, req.quantity)
        .await?;
    Ok(Json(inventory_response(&record)))
}

/// POST /inventory/:sku/production — queue quantity into production.
#[tracing::instrument(skip(state, req))]
pub async fn queue_production<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let sku = Sku::new(sku);
    let record = state
        .coordinator
        .ledger()
        .queue_production(&sku, req.quantity)
        .await?;
    Ok(Json(inventory_response(&record)))
}

/// POST /inventory/:sku/production/complete — move finished production into
/// free stock.
#[tracing::instrument(skip(state, req))]
pub async fn complete_production<S: TableStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let sku = Sku::new(sku);
    let record = state
        .coordinator
        .ledger()
        .complete_production(&sku, req.quantity)
        .await?;
    Ok(Json(inventory_response(&record)))
}

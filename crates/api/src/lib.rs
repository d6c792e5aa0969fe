//! HTTP API server with observability for the fulfillment core.
//!
//! Provides REST endpoints for order fulfillment commands and inventory
//! intake, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use coordinator::{FulfillmentCoordinator, ReservedQuantityCascade};
use metrics_exporter_prometheus::PrometheusHandle;
use table_store::TableStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: TableStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
        .route("/orders/{id}/approve", post(routes::orders::approve::<S>))
        .route("/orders/{id}/reject", post(routes::orders::reject::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/lines/{line_id}/allocate",
            post(routes::orders::allocate::<S>),
        )
        .route(
            "/orders/{id}/lines/{line_id}/dispatch",
            post(routes::orders::dispatch::<S>),
        )
        .route(
            "/orders/{id}/lines/{line_id}/deliver",
            post(routes::orders::deliver::<S>),
        )
        .route("/inventory/{sku}", get(routes::inventory::get::<S>))
        .route(
            "/inventory/{sku}/restock",
            post(routes::inventory::restock::<S>),
        )
        .route(
            "/inventory/{sku}/production",
            post(routes::inventory::queue_production::<S>),
        )
        .route(
            "/inventory/{sku}/production/complete",
            post(routes::inventory::complete_production::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state with a custom critical-section wait: a
/// coordinator over the given store with the client-product reservation
/// cascade registered.
pub fn create_state<S: TableStore + Clone + 'static>(
    store: S,
    lock_wait: std::time::Duration,
) -> Arc<AppState<S>> {
    let coordinator = FulfillmentCoordinator::with_lock_wait(store.clone(), lock_wait)
        .with_hook(Arc::new(ReservedQuantityCascade::new(store)));

    Arc::new(AppState { coordinator })
}

/// Creates the default application state with the default lock wait.
pub fn create_default_state<S: TableStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    create_state(store, ledger::DEFAULT_LOCK_WAIT)
}

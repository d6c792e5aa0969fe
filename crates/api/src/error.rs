//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coordinator::FulfillmentError;
use domain::{DomainError, OrderError};
use ledger::LedgerError;
use table_store::TableStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Fulfillment command error.
    Fulfillment(FulfillmentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match &err {
        FulfillmentError::Domain(domain_err) => match domain_err {
            DomainError::Order(order_err) => match order_err {
                OrderError::InvalidTransition { .. }
                | OrderError::QuantityBounds { .. }
                | OrderError::LineCancelled { .. } => StatusCode::CONFLICT,
                OrderError::LineNotFound { .. } => StatusCode::NOT_FOUND,
                OrderError::InvalidQuantity { .. } | OrderError::NoLines => {
                    StatusCode::BAD_REQUEST
                }
            },
            DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Store(TableStoreError::ConcurrencyConflict { .. }) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        FulfillmentError::Ledger(ledger_err) => match ledger_err {
            LedgerError::InsufficientStock { .. } | LedgerError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            LedgerError::SkuNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Store(TableStoreError::ConcurrencyConflict { .. }) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        FulfillmentError::Store(TableStoreError::ConcurrencyConflict { .. }) => {
            StatusCode::CONFLICT
        }
        FulfillmentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        FulfillmentError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "fulfillment command failed unexpectedly");
    }

    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Fulfillment(FulfillmentError::Ledger(err))
    }
}

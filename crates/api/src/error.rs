//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use saga::{RefundError, SagaError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order construction error.
    Order(OrderError),
    /// Refund request/cancel/retry error.
    Refund(RefundError),
    /// Saga orchestration error.
    Saga(SagaError),
    /// Datastore error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Refund(err) => refund_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn refund_error_to_response(err: RefundError) -> (StatusCode, String) {
    match &err {
        RefundError::OrderNotFound(_) | RefundError::RefundNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        RefundError::OrderNotRefundable { .. }
        | RefundError::InvalidAmount
        | RefundError::AmountExceedsRefundable { .. }
        | RefundError::FullRefundMismatch { .. }
        | RefundError::NotCancellable(_)
        | RefundError::NotRetryable(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        RefundError::Store(store_err) => store_error_status(store_err, &err),
        RefundError::Queue(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::Store(store_err) => store_error_status(store_err, &err),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    let message = err.to_string();
    let (status, _) = store_error_status(&err, &message);
    (status, message)
}

fn store_error_status(err: &StoreError, outer: &impl std::fmt::Display) -> (StatusCode, String) {
    let status = match err {
        StoreError::OrderNotFound(_)
        | StoreError::RefundNotFound(_)
        | StoreError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateOrderRef(_)
        | StoreError::DuplicateRefundRef(_)
        | StoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StoreError::InsufficientStock { .. } | StoreError::RefundExceedsRefundable { .. } => {
            StatusCode::BAD_REQUEST
        }
    };
    (status, outer.to_string())
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<RefundError> for ApiError {
    fn from(err: RefundError) -> Self {
        ApiError::Refund(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

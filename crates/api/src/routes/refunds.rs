//! Refund entry point and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::Money;
use domain::{Refund, RefundType};
use saga::RefundRequest;
use serde::{Deserialize, Serialize};
use store::Datastore;

use crate::error::ApiError;
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateRefundRequest {
    pub order_ref: String,
    pub amount_cents: i64,
    pub refund_type: RefundType,
    pub reason: Option<String>,
    pub description: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct RefundAcceptedResponse {
    pub refund_ref: String,
    pub order_ref: String,
    pub amount_cents: i64,
    pub refund_type: RefundType,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderRefundsResponse {
    pub order_ref: String,
    pub total_amount_cents: i64,
    pub total_refunded_cents: i64,
    pub refundable_amount_cents: i64,
    pub is_fully_refunded: bool,
    pub refunds: Vec<Refund>,
}

impl From<Refund> for RefundAcceptedResponse {
    fn from(refund: Refund) -> Self {
        Self {
            refund_ref: refund.refund_ref,
            order_ref: refund.order_ref,
            amount_cents: refund.amount.cents(),
            refund_type: refund.refund_type,
            status: refund.status.to_string(),
            requested_at: refund.requested_at,
        }
    }
}

// -- Handlers --

/// POST /refunds — validate and accept a refund request.
#[tracing::instrument(skip(state, req), fields(order_ref = %req.order_ref))]
pub async fn create<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Json(req): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<RefundAcceptedResponse>), ApiError> {
    let refund = state
        .refunds
        .request_refund(RefundRequest {
            order_ref: req.order_ref,
            amount: Money::from_cents(req.amount_cents),
            refund_type: req.refund_type,
            reason: req.reason,
            description: req.description,
            metadata: serde_json::json!({ "requested_by_api": true }),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(refund.into())))
}

/// GET /refunds/{ref} — full refund record.
pub async fn get<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(refund_ref): Path<String>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state.refunds.refund(&refund_ref).await?;
    Ok(Json(refund))
}

/// POST /refunds/{ref}/cancel — cancel a still-pending refund.
#[tracing::instrument(skip(state))]
pub async fn cancel<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(refund_ref): Path<String>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state.refunds.cancel_refund(&refund_ref).await?;
    Ok(Json(refund))
}

/// POST /refunds/{ref}/retry — reset a failed refund and re-enqueue it.
#[tracing::instrument(skip(state))]
pub async fn retry<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(refund_ref): Path<String>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state.refunds.retry_refund(&refund_ref).await?;
    Ok(Json(refund))
}

/// GET /orders/{ref}/refunds — the order's refunds and balance summary.
pub async fn for_order<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(order_ref): Path<String>,
) -> Result<Json<OrderRefundsResponse>, ApiError> {
    let summary = state.refunds.order_summary(&order_ref).await?;
    Ok(Json(OrderRefundsResponse {
        order_ref: summary.order.order_ref.clone(),
        total_amount_cents: summary.order.total_amount.cents(),
        total_refunded_cents: summary.total_refunded.cents(),
        refundable_amount_cents: summary.refundable_amount.cents(),
        is_fully_refunded: summary.is_fully_refunded,
        refunds: summary.refunds,
    }))
}

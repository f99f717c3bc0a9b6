//! Order intake and read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, Sku};
use domain::{Order, OrderDraft, Payment, StockReservation};
use queue::TaskQueue;
use saga::{Orchestrator, RefundService};
use serde::{Deserialize, Serialize};
use store::Datastore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<D: Datastore> {
    pub store: Arc<D>,
    pub queue: Arc<TaskQueue>,
    pub orchestrator: Orchestrator<D>,
    pub refunds: RefundService<D>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_ref: String,
    pub customer_id: String,
    pub customer_name: String,
    pub sku: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub currency: String,
    pub ordered_at: Option<DateTime<Utc>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderAcceptedResponse {
    pub order_ref: String,
    pub status: String,
    pub total_amount_cents: i64,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    pub order: Order,
    pub reservations: Vec<StockReservation>,
    pub payment: Option<Payment>,
}

// -- Handlers --

/// POST /orders — accept an order and start its fulfillment workflow.
#[tracing::instrument(skip(state, req), fields(order_ref = %req.order_ref))]
pub async fn create<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderAcceptedResponse>), ApiError> {
    let order = Order::new(OrderDraft {
        order_ref: req.order_ref,
        customer_id: req.customer_id,
        customer_name: req.customer_name,
        sku: Sku::new(req.sku),
        product_name: req.product_name,
        quantity: req.quantity,
        unit_price: Money::from_cents(req.unit_price_cents),
        currency: req.currency,
        ordered_at: req.ordered_at.unwrap_or_else(Utc::now),
    })?;

    let order = state.store.insert_order(order).await?;
    state.orchestrator.start(order.id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderAcceptedResponse {
            order_ref: order.order_ref,
            status: order.status.to_string(),
            total_amount_cents: order.total_amount.cents(),
        }),
    ))
}

/// GET /orders/{ref} — order with its reservations and latest payment.
pub async fn get<D: Datastore + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Path(order_ref): Path<String>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let order = state
        .store
        .order_by_ref(&order_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {order_ref}")))?;

    let reservations = state.store.reservations_for_order(order.id).await?;
    let payment = state.store.latest_payment(order.id).await?;

    Ok(Json(OrderDetailResponse {
        order,
        reservations,
        payment,
    }))
}

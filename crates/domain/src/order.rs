//! Order record and status state machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, Sku};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order in its fulfillment lifecycle.
///
/// Legal transitions:
/// ```text
/// Pending ──► Reserved ──► PaymentProcessing ──► Completed
///    │            │                │
///    └────────────┴────────────────┴──► Failed
///                 │                │      │
///                 └────────────────┴──────┴──► Rollback
/// ```
/// `Completed` and `Rollback` are terminal for the saga. A refund may still
/// be applied to a `Completed` order without changing its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted, workflow not yet started or reserve pending.
    #[default]
    Pending,

    /// Inventory has been debited and reserved.
    Reserved,

    /// A payment attempt is in flight or has been made.
    PaymentProcessing,

    /// Payment captured and reservations committed (terminal).
    Completed,

    /// A saga step failed; awaiting compensation.
    Failed,

    /// Compensation ran: reservations released, order closed (terminal).
    Rollback,
}

impl OrderStatus {
    /// Returns true if `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Reserved)
                | (Reserved, PaymentProcessing)
                | (PaymentProcessing, Completed)
                | (Pending | Reserved | PaymentProcessing, Failed)
                | (Reserved | PaymentProcessing | Failed, Rollback)
        )
    }

    /// Returns true if the saga can make no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rollback)
    }

    /// Returns true if a refund may be requested against the order.
    pub fn is_refundable(self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Reserved => "reserved",
            OrderStatus::PaymentProcessing => "payment_processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when constructing an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Quantity must be at least one.
    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    /// Unit price must not be negative.
    #[error("unit price must not be negative: {0}")]
    InvalidUnitPrice(Money),
}

/// Input for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub order_ref: String,
    pub customer_id: String,
    pub customer_name: String,
    pub sku: Sku,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub currency: String,
    pub ordered_at: DateTime<Utc>,
}

/// An order, the aggregate root of the fulfillment flow.
///
/// `total_amount` is fixed at creation and never recomputed by downstream
/// steps. The record is mutated only by saga steps (via guarded status
/// transitions) and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Unique business reference (e.g. `ORD-2024-0001`).
    pub order_ref: String,
    pub customer_id: String,
    pub customer_name: String,
    pub sku: Sku,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub currency: String,
    pub ordered_at: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new `Pending` order, computing `total_amount` from the
    /// draft's quantity and unit price.
    pub fn new(draft: OrderDraft) -> Result<Order, OrderError> {
        if draft.quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }
        if draft.unit_price.is_negative() {
            return Err(OrderError::InvalidUnitPrice(draft.unit_price));
        }

        Ok(Order {
            id: OrderId::new(),
            order_ref: draft.order_ref,
            customer_id: draft.customer_id,
            customer_name: draft.customer_name,
            sku: draft.sku,
            product_name: draft.product_name,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            currency: draft.currency,
            ordered_at: draft.ordered_at,
            total_amount: draft.unit_price.multiply(draft.quantity),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        })
    }
}

//! Store error types.

use common::{Money, OrderId, PaymentId, RefundId, Sku};
use thiserror::Error;

/// Errors that can occur during datastore operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with the same business reference already exists.
    #[error("duplicate order reference: {0}")]
    DuplicateOrderRef(String),

    /// Payment not found.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// Refund not found.
    #[error("refund not found: {0}")]
    RefundNotFound(RefundId),

    /// A refund with the same reference already exists.
    #[error("duplicate refund reference: {0}")]
    DuplicateRefundRef(String),

    /// Not enough stock to cover a reservation.
    #[error("insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: Sku,
        available: u32,
        requested: u32,
    },

    /// A status change violated the entity's state machine.
    #[error("invalid {entity} transition for {reference}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        reference: String,
        from: String,
        to: String,
    },

    /// Completing the refund would push the order's completed-refund total
    /// past its total amount.
    #[error("refund amount {requested} exceeds remaining refundable amount {refundable}")]
    RefundExceedsRefundable { requested: Money, refundable: Money },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Saga error types.

use common::{Money, OrderId};
use domain::OrderStatus;
use queue::{QueueError, TaskError};
use store::StoreError;
use thiserror::Error;

use crate::services::gateway::GatewayError;

/// Errors that can occur while executing saga steps.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Finalize ran without a completed payment on the order.
    #[error("payment not completed for order {0}")]
    PaymentIncomplete(String),

    /// The refund's order is no longer in a refundable status.
    #[error("order {order_ref} is not eligible for refund (status: {status})")]
    OrderNotRefundable {
        order_ref: String,
        status: OrderStatus,
    },

    /// The refund amount no longer fits the remaining refundable balance.
    #[error("refund amount {requested} exceeds remaining refundable amount {refundable}")]
    AmountExceedsRefundable { requested: Money, refundable: Money },

    /// Datastore error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Gateway declined or failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Task queue error.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<SagaError> for TaskError {
    fn from(err: SagaError) -> Self {
        TaskError::new(err)
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

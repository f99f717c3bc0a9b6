//! Refund request entry point.
//!
//! Validation happens synchronously here and never enqueues anything on
//! failure; accepted requests are persisted as `Pending` and settled
//! asynchronously by the `ProcessRefund` task.

use std::sync::Arc;

use common::Money;
use domain::{Order, OrderStatus, Refund, RefundDraft, RefundStatus, RefundType};
use queue::{QueueError, TaskQueue};
use store::{Datastore, StoreError};
use thiserror::Error;

use crate::jobs::{QUEUE_REFUNDS, process_refund_task};
use crate::services::gateway::reference_token;

/// Errors surfaced to refund requesters.
#[derive(Debug, Error)]
pub enum RefundError {
    /// No order with the given reference.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// No refund with the given reference.
    #[error("refund not found: {0}")]
    RefundNotFound(String),

    /// The order is not in a refundable status.
    #[error("order {order_ref} is not eligible for refund (status: {status})")]
    OrderNotRefundable {
        order_ref: String,
        status: OrderStatus,
    },

    /// The refund amount must be positive.
    #[error("refund amount must be greater than zero")]
    InvalidAmount,

    /// The amount exceeds what is still refundable on the order.
    #[error("refund amount {requested} exceeds refundable amount {refundable}")]
    AmountExceedsRefundable { requested: Money, refundable: Money },

    /// A full refund must cover exactly the remaining refundable amount.
    #[error("full refund amount {requested} must equal the refundable amount {refundable}")]
    FullRefundMismatch { requested: Money, refundable: Money },

    /// Only pending refunds can be cancelled.
    #[error("cannot cancel refund in status: {0}")]
    NotCancellable(RefundStatus),

    /// Only failed refunds can be retried.
    #[error("cannot retry refund in status: {0}")]
    NotRetryable(RefundStatus),

    /// Datastore error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Task queue error.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// A refund request as it arrives from the API layer.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_ref: String,
    pub amount: Money,
    pub refund_type: RefundType,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

/// Refundable-balance summary for one order.
#[derive(Debug, Clone)]
pub struct OrderRefundSummary {
    pub order: Order,
    pub total_refunded: Money,
    pub refundable_amount: Money,
    pub is_fully_refunded: bool,
    pub refunds: Vec<Refund>,
}

/// Validates and accepts refund requests, and owns the cancel/retry
/// entry points.
pub struct RefundService<D> {
    store: Arc<D>,
    queue: Arc<TaskQueue>,
}

impl<D: Datastore> RefundService<D> {
    /// Creates a new refund service.
    pub fn new(store: Arc<D>, queue: Arc<TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Validates the request against the order's remaining refundable
    /// balance, persists a `Pending` refund, and enqueues its settlement.
    #[tracing::instrument(skip(self, request), fields(order_ref = %request.order_ref))]
    pub async fn request_refund(&self, request: RefundRequest) -> Result<Refund, RefundError> {
        let order = self
            .store
            .order_by_ref(&request.order_ref)
            .await?
            .ok_or_else(|| RefundError::OrderNotFound(request.order_ref.clone()))?;

        if !order.status.is_refundable() {
            return Err(RefundError::OrderNotRefundable {
                order_ref: order.order_ref,
                status: order.status,
            });
        }
        if !request.amount.is_positive() {
            return Err(RefundError::InvalidAmount);
        }

        let completed = self.store.completed_refund_total(order.id, None).await?;
        let refundable = order.total_amount.saturating_sub(completed);
        if request.amount > refundable {
            return Err(RefundError::AmountExceedsRefundable {
                requested: request.amount,
                refundable,
            });
        }
        if request.refund_type == RefundType::Full && request.amount != refundable {
            return Err(RefundError::FullRefundMismatch {
                requested: request.amount,
                refundable,
            });
        }

        let refund = Refund::pending(RefundDraft {
            refund_ref: format!("REF-{}-{}", order.order_ref, reference_token(6)),
            order_id: order.id,
            order_ref: order.order_ref.clone(),
            customer_id: order.customer_id.clone(),
            refund_type: request.refund_type,
            amount: request.amount,
            original_amount: order.total_amount,
            reason: request.reason,
            description: request.description,
            metadata: request.metadata,
        });
        let refund = self.store.insert_refund(refund).await?;

        self.queue
            .enqueue(QUEUE_REFUNDS, process_refund_task(refund.id));
        metrics::counter!("refunds_requested").increment(1);
        tracing::info!(
            refund_ref = %refund.refund_ref,
            amount = %refund.amount,
            refund_type = %refund.refund_type,
            "refund requested"
        );
        Ok(refund)
    }

    /// Cancels a refund that has not started processing.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_refund(&self, refund_ref: &str) -> Result<Refund, RefundError> {
        let refund = self
            .store
            .refund_by_ref(refund_ref)
            .await?
            .ok_or_else(|| RefundError::RefundNotFound(refund_ref.to_string()))?;

        if refund.status != RefundStatus::Pending {
            return Err(RefundError::NotCancellable(refund.status));
        }
        let refund = self.store.cancel_refund(refund.id).await?;
        tracing::info!(refund_ref = %refund.refund_ref, "refund cancelled");
        Ok(refund)
    }

    /// Resets a failed refund to `Pending` and re-enqueues its
    /// settlement. This is the only way a failed refund re-enters the
    /// pipeline.
    #[tracing::instrument(skip(self))]
    pub async fn retry_refund(&self, refund_ref: &str) -> Result<Refund, RefundError> {
        let refund = self
            .store
            .refund_by_ref(refund_ref)
            .await?
            .ok_or_else(|| RefundError::RefundNotFound(refund_ref.to_string()))?;

        if refund.status != RefundStatus::Failed {
            return Err(RefundError::NotRetryable(refund.status));
        }
        let refund = self.store.reset_refund_for_retry(refund.id).await?;
        self.queue
            .enqueue(QUEUE_REFUNDS, process_refund_task(refund.id));
        tracing::info!(refund_ref = %refund.refund_ref, "refund queued for retry");
        Ok(refund)
    }

    /// Loads a refund by reference.
    pub async fn refund(&self, refund_ref: &str) -> Result<Refund, RefundError> {
        self.store
            .refund_by_ref(refund_ref)
            .await?
            .ok_or_else(|| RefundError::RefundNotFound(refund_ref.to_string()))
    }

    /// Returns the order's refunds with its refundable-balance summary.
    pub async fn order_summary(&self, order_ref: &str) -> Result<OrderRefundSummary, RefundError> {
        let order = self
            .store
            .order_by_ref(order_ref)
            .await?
            .ok_or_else(|| RefundError::OrderNotFound(order_ref.to_string()))?;

        let refunds = self.store.refunds_for_order(order.id).await?;
        let total_refunded = self.store.completed_refund_total(order.id, None).await?;
        let refundable_amount = order.total_amount.saturating_sub(total_refunded);
        let is_fully_refunded = total_refunded >= order.total_amount;

        Ok(OrderRefundSummary {
            order,
            total_refunded,
            refundable_amount,
            is_fully_refunded,
            refunds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tests::{complete_order, insert_order, seed_product};
    use store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        queue: Arc<TaskQueue>,
        service: RefundService<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(TaskQueue::new());
        let service = RefundService::new(store.clone(), queue.clone());
        Harness {
            store,
            queue,
            service,
        }
    }

    fn request(cents: i64, refund_type: RefundType) -> RefundRequest {
        RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(cents),
            refund_type,
            reason: None,
            description: None,
            metadata: serde_json::json!({}),
        }
    }

    async fn completed_order(h: &Harness) {
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
    }

    #[tokio::test]
    async fn test_valid_request_persists_and_enqueues() {
        let h = harness();
        completed_order(&h).await;

        let refund = h
            .service
            .request_refund(request(800, RefundType::Partial))
            .await
            .unwrap();

        assert_eq!(refund.status, RefundStatus::Pending);
        assert!(refund.refund_ref.starts_with("REF-ORD-1-"));
        assert_eq!(refund.original_amount.cents(), 2000);
        assert_eq!(h.queue.pending(QUEUE_REFUNDS), 1);
    }

    #[tokio::test]
    async fn test_rejects_unrefundable_order() {
        let h = harness();
        seed_product(&h.store, 5).await;
        insert_order(&h.store, "ORD-1", 2).await;

        let result = h.service.request_refund(request(800, RefundType::Partial)).await;
        assert!(matches!(result, Err(RefundError::OrderNotRefundable { .. })));
        assert!(h.queue.is_idle());
    }

    #[tokio::test]
    async fn test_rejects_unknown_order() {
        let h = harness();
        let result = h.service.request_refund(request(800, RefundType::Partial)).await;
        assert!(matches!(result, Err(RefundError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let h = harness();
        completed_order(&h).await;

        let result = h.service.request_refund(request(0, RefundType::Partial)).await;
        assert!(matches!(result, Err(RefundError::InvalidAmount)));
    }

    #[tokio::test]
    async fn test_rejects_amount_over_refundable() {
        let h = harness();
        completed_order(&h).await;

        let result = h.service.request_refund(request(2500, RefundType::Partial)).await;
        assert!(matches!(
            result,
            Err(RefundError::AmountExceedsRefundable { .. })
        ));
        // Nothing persisted, nothing queued.
        assert!(h.queue.is_idle());
    }

    #[tokio::test]
    async fn test_full_refund_must_match_refundable() {
        let h = harness();
        completed_order(&h).await;

        let result = h.service.request_refund(request(1500, RefundType::Full)).await;
        assert!(matches!(result, Err(RefundError::FullRefundMismatch { .. })));

        let refund = h
            .service
            .request_refund(request(2000, RefundType::Full))
            .await
            .unwrap();
        assert_eq!(refund.refund_type, RefundType::Full);
    }

    #[tokio::test]
    async fn test_cancel_pending_refund() {
        let h = harness();
        completed_order(&h).await;
        let refund = h
            .service
            .request_refund(request(800, RefundType::Partial))
            .await
            .unwrap();

        let cancelled = h.service.cancel_refund(&refund.refund_ref).await.unwrap();
        assert_eq!(cancelled.status, RefundStatus::Cancelled);

        let result = h.service.cancel_refund(&refund.refund_ref).await;
        assert!(matches!(result, Err(RefundError::NotCancellable(_))));
    }

    #[tokio::test]
    async fn test_retry_requires_failed_status() {
        let h = harness();
        completed_order(&h).await;
        let refund = h
            .service
            .request_refund(request(800, RefundType::Partial))
            .await
            .unwrap();

        let result = h.service.retry_refund(&refund.refund_ref).await;
        assert!(matches!(result, Err(RefundError::NotRetryable(_))));

        h.store
            .fail_refund(refund.id, "gateway declined".to_string())
            .await
            .unwrap();
        let retried = h.service.retry_refund(&refund.refund_ref).await.unwrap();
        assert_eq!(retried.status, RefundStatus::Pending);
        assert!(retried.error_message.is_none());
        assert_eq!(h.queue.pending(QUEUE_REFUNDS), 2);
    }

    #[tokio::test]
    async fn test_order_summary_tracks_balance() {
        let h = harness();
        completed_order(&h).await;
        let refund = h
            .service
            .request_refund(request(800, RefundType::Partial))
            .await
            .unwrap();
        h.store.begin_refund_processing(refund.id).await.unwrap();
        h.store
            .complete_refund(refund.id, "REF-TXN-1".to_string())
            .await
            .unwrap();

        let summary = h.service.order_summary("ORD-1").await.unwrap();
        assert_eq!(summary.total_refunded.cents(), 800);
        assert_eq!(summary.refundable_amount.cents(), 1200);
        assert!(!summary.is_fully_refunded);
        assert_eq!(summary.refunds.len(), 1);
    }
}

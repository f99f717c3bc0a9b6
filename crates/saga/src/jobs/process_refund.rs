//! Asynchronous refund settlement.

use std::sync::Arc;

use async_trait::async_trait;
use common::RefundId;
use domain::{Order, Refund, RefundStatus};
use queue::{TaskError, TaskHandler, TaskResult};
use store::{Datastore, StoreError};

use crate::error::SagaError;
use crate::jobs::RefundTask;
use crate::services::events::EventSink;
use crate::services::gateway::PaymentGateway;

/// Settles a pending refund against the gateway.
///
/// Idempotency guard: an already-completed refund is a no-op — no second
/// gateway call, no status regression. The remaining refundable amount is
/// re-validated excluding the refund's own row (it was persisted before
/// this check and must not be counted against itself), and the store
/// re-checks the balance invariant once more when flipping
/// `Processing -> Completed`.
pub struct ProcessRefund<D> {
    store: Arc<D>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventSink>,
}

impl<D: Datastore> ProcessRefund<D> {
    pub fn new(store: Arc<D>, gateway: Arc<dyn PaymentGateway>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            gateway,
            events,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, refund_id: RefundId) -> Result<(), SagaError> {
        let Some(refund) = self.store.refund(refund_id).await? else {
            tracing::error!(%refund_id, "refund not found, dropping task");
            return Ok(());
        };

        match refund.status {
            RefundStatus::Completed => {
                tracing::info!(refund_ref = %refund.refund_ref, "already completed, skipping");
                return Ok(());
            }
            RefundStatus::Cancelled => {
                tracing::info!(refund_ref = %refund.refund_ref, "cancelled, skipping");
                return Ok(());
            }
            _ => {}
        }
        tracing::info!(
            refund_ref = %refund.refund_ref,
            amount = %refund.amount,
            "processing refund"
        );

        let Some(order) = self.store.order(refund.order_id).await? else {
            // Retrying cannot make the order appear; park the refund as
            // failed for an operator to look at.
            tracing::error!(refund_ref = %refund.refund_ref, "order missing for refund");
            self.store
                .fail_refund(refund.id, "order not found".to_string())
                .await?;
            return Ok(());
        };

        if let Err(err) = self.validate(&order, &refund).await {
            self.store.fail_refund(refund.id, err.to_string()).await?;
            metrics::counter!("refunds_failed").increment(1);
            tracing::warn!(refund_ref = %refund.refund_ref, error = %err, "refund validation failed");
            return Err(err);
        }

        self.store.begin_refund_processing(refund.id).await?;

        match self.gateway.refund(&refund.refund_ref, refund.amount).await {
            Ok(transaction_id) => self.complete(&refund, transaction_id).await,
            Err(err) => {
                self.store.fail_refund(refund.id, err.to_string()).await?;
                metrics::counter!("refunds_failed").increment(1);
                tracing::warn!(refund_ref = %refund.refund_ref, error = %err, "refund declined");
                Err(err.into())
            }
        }
    }

    async fn validate(&self, order: &Order, refund: &Refund) -> Result<(), SagaError> {
        if !order.status.is_refundable() {
            return Err(SagaError::OrderNotRefundable {
                order_ref: order.order_ref.clone(),
                status: order.status,
            });
        }

        let completed = self
            .store
            .completed_refund_total(order.id, Some(refund.id))
            .await?;
        let refundable = order.total_amount.saturating_sub(completed);
        if refund.amount > refundable {
            return Err(SagaError::AmountExceedsRefundable {
                requested: refund.amount,
                refundable,
            });
        }
        Ok(())
    }

    async fn complete(&self, refund: &Refund, transaction_id: String) -> Result<(), SagaError> {
        match self.store.complete_refund(refund.id, transaction_id).await {
            Ok(completed) => {
                self.events.refund_completed(&completed).await;
                metrics::counter!("refunds_completed").increment(1);
                tracing::info!(
                    refund_ref = %completed.refund_ref,
                    transaction_id = completed.transaction_id.as_deref(),
                    "refund completed"
                );
                Ok(())
            }
            Err(err @ StoreError::RefundExceedsRefundable { .. }) => {
                // A concurrent refund won the balance; park this one.
                self.store.fail_refund(refund.id, err.to_string()).await?;
                metrics::counter!("refunds_failed").increment(1);
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for ProcessRefund<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: RefundTask = serde_json::from_value(payload)?;
        self.run(task.refund_id).await.map_err(TaskError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tests::{complete_order, insert_order, insert_refund, seed_product};
    use crate::services::events::RecordingEventSink;
    use crate::services::gateway::RecordingGateway;
    use store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        gateway: Arc<RecordingGateway>,
        events: Arc<RecordingEventSink>,
        handler: ProcessRefund<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let events = Arc::new(RecordingEventSink::new());
        let handler = ProcessRefund::new(store.clone(), gateway.clone(), events.clone());
        Harness {
            store,
            gateway,
            events,
            handler,
        }
    }

    #[tokio::test]
    async fn test_refund_settles_and_emits_event() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
        let refund = insert_refund(&h.store, &order, 800).await;

        h.handler.run(refund.id).await.unwrap();

        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
        assert!(refund.transaction_id.is_some());
        assert!(refund.processed_at.is_some());
        assert_eq!(h.events.completed_refunds(), vec![refund.id]);
        assert_eq!(h.gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_reprocessing_completed_refund_is_noop() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
        let refund = insert_refund(&h.store, &order, 800).await;

        h.handler.run(refund.id).await.unwrap();
        h.handler.run(refund.id).await.unwrap();

        // No second gateway call, no second event, no status regression.
        assert_eq!(h.gateway.refund_count(), 1);
        assert_eq!(h.events.completed_refunds().len(), 1);
        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
    }

    #[tokio::test]
    async fn test_own_row_not_double_counted() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
        // A full-balance refund must pass validation even though its own
        // pending row exists while the check runs.
        let refund = insert_refund(&h.store, &order, 2000).await;

        h.handler.run(refund.id).await.unwrap();

        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_during_processing() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;

        let first = insert_refund(&h.store, &order, 1500).await;
        h.handler.run(first.id).await.unwrap();

        // $15 of $20 is gone; $8 more no longer fits.
        let second = insert_refund(&h.store, &order, 800).await;
        let result = h.handler.run(second.id).await;
        assert!(matches!(
            result,
            Err(SagaError::AmountExceedsRefundable { .. })
        ));

        let second = h.store.refund(second.id).await.unwrap().unwrap();
        assert_eq!(second.status, RefundStatus::Failed);
        // The rejected refund never reached the gateway.
        assert_eq!(h.gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_gateway_decline_fails_refund_and_propagates() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
        let refund = insert_refund(&h.store, &order, 800).await;

        h.gateway.set_fail_on_refund(true);
        let result = h.handler.run(refund.id).await;
        assert!(matches!(result, Err(SagaError::Gateway(_))));

        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Failed);
        assert!(refund.error_message.is_some());
        assert!(h.events.completed_refunds().is_empty());

        // A queue retry re-enters processing and can succeed.
        h.gateway.set_fail_on_refund(false);
        h.handler.run(refund.id).await.unwrap();
        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_refund_is_skipped() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        complete_order(&h.store, &order).await;
        let refund = insert_refund(&h.store, &order, 800).await;
        h.store.cancel_refund(refund.id).await.unwrap();

        h.handler.run(refund.id).await.unwrap();

        assert_eq!(h.gateway.refund_count(), 0);
        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_unrefundable_order_parks_refund() {
        let h = harness();
        seed_product(&h.store, 5).await;
        let order = insert_order(&h.store, "ORD-1", 2).await;
        // Order never completed.
        let refund = insert_refund(&h.store, &order, 800).await;

        let result = h.handler.run(refund.id).await;
        assert!(matches!(result, Err(SagaError::OrderNotRefundable { .. })));

        let refund = h.store.refund(refund.id).await.unwrap().unwrap();
        assert_eq!(refund.status, RefundStatus::Failed);
        assert_eq!(h.gateway.refund_count(), 0);
    }
}

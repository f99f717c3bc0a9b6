//! Second saga step: charge the customer through the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::{OrderStatus, Payment};
use queue::{TaskError, TaskHandler, TaskResult};
use store::Datastore;

use crate::error::SagaError;
use crate::jobs::OrderTask;
use crate::services::gateway::PaymentGateway;

/// Creates a payment attempt, moves the order to `PaymentProcessing`, and
/// invokes the gateway.
///
/// Every attempt creates a fresh `Payment` row (the order's effective
/// payment is the latest one). A decline marks the row `Failed` and
/// propagates, aborting the chain; the gateway itself never mutates order
/// status.
pub struct ProcessPayment<D> {
    store: Arc<D>,
    gateway: Arc<dyn PaymentGateway>,
}

impl<D: Datastore> ProcessPayment<D> {
    pub fn new(store: Arc<D>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, order_id: OrderId) -> Result<(), SagaError> {
        let Some(order) = self.store.order(order_id).await? else {
            tracing::error!(%order_id, "order not found, dropping task");
            return Ok(());
        };
        tracing::info!(
            order_ref = %order.order_ref,
            amount = %order.total_amount,
            "processing payment"
        );

        let payment = self
            .store
            .insert_payment(Payment::processing(
                order.id,
                order.total_amount,
                order.currency.clone(),
            ))
            .await?;
        self.store
            .transition_order(order.id, OrderStatus::PaymentProcessing)
            .await?;

        match self
            .gateway
            .charge(&order.order_ref, order.total_amount, &order.currency)
            .await
        {
            Ok(transaction_id) => {
                self.store
                    .complete_payment(payment.id, transaction_id.clone())
                    .await?;
                metrics::counter!("payments_completed").increment(1);
                tracing::info!(
                    order_ref = %order.order_ref,
                    transaction_id,
                    "payment completed"
                );
                Ok(())
            }
            Err(err) => {
                self.store.fail_payment(payment.id, err.to_string()).await?;
                metrics::counter!("saga_step_failures", "step" => "process_payment").increment(1);
                tracing::warn!(order_ref = %order.order_ref, error = %err, "payment declined");
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for ProcessPayment<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: OrderTask = serde_json::from_value(payload)?;
        self.run(task.order_id).await.map_err(TaskError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tests::{insert_order, reserve_and_advance, seed_product};
    use crate::services::gateway::RecordingGateway;
    use domain::PaymentStatus;
    use store::MemoryStore;

    #[tokio::test]
    async fn test_successful_charge_completes_payment() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        seed_product(&store, 5).await;
        let order = insert_order(&store, "ORD-1", 2).await;
        reserve_and_advance(&store, &order).await;

        ProcessPayment::new(store.clone(), gateway.clone())
            .run(order.id)
            .await
            .unwrap();

        let order = store.order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PaymentProcessing);
        let payment = store.latest_payment(order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.transaction_id.as_deref(), Some("TXN-0001"));
        assert_eq!(payment.amount, order.total_amount);
    }

    #[tokio::test]
    async fn test_decline_fails_payment_and_propagates() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        gateway.set_fail_on_charge(true);
        seed_product(&store, 5).await;
        let order = insert_order(&store, "ORD-1", 2).await;
        reserve_and_advance(&store, &order).await;

        let result = ProcessPayment::new(store.clone(), gateway.clone())
            .run(order.id)
            .await;
        assert!(matches!(result, Err(SagaError::Gateway(_))));

        // The order stays abandoned at payment_processing for compensation.
        let order = store.order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PaymentProcessing);
        let payment = store.latest_payment(order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.error_message.is_some());
    }

    #[tokio::test]
    async fn test_each_retry_creates_a_fresh_payment_row() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        seed_product(&store, 5).await;
        let order = insert_order(&store, "ORD-1", 2).await;
        reserve_and_advance(&store, &order).await;
        let handler = ProcessPayment::new(store.clone(), gateway.clone());

        gateway.set_fail_on_charge(true);
        let _ = handler.run(order.id).await;
        gateway.set_fail_on_charge(false);
        handler.run(order.id).await.unwrap();

        assert_eq!(store.payment_count().await, 2);
        let latest = store.latest_payment(order.id).await.unwrap().unwrap();
        assert_eq!(latest.status, PaymentStatus::Completed);
    }
}

//! First saga step: debit inventory and reserve it for the order.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderStatus};
use queue::{TaskError, TaskHandler, TaskResult};
use store::Datastore;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::jobs::OrderTask;

/// Reserves stock for the order and moves it to `Reserved`.
///
/// The ledger reserve is idempotent per (order, SKU), so re-execution
/// after a duplicate delivery neither double-debits stock nor creates a
/// second reservation row. On any failure the order is marked `Failed`
/// (best effort) before the error propagates, so an abandoned chain
/// always rests at a terminal, inspectable status for compensation.
pub struct ReserveStock<D> {
    store: Arc<D>,
    config: SagaConfig,
}

impl<D: Datastore> ReserveStock<D> {
    pub fn new(store: Arc<D>, config: SagaConfig) -> Self {
        Self { store, config }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, order_id: OrderId) -> Result<(), SagaError> {
        let Some(order) = self.store.order(order_id).await? else {
            tracing::error!(%order_id, "order not found, dropping task");
            return Ok(());
        };
        tracing::info!(order_ref = %order.order_ref, quantity = order.quantity, "reserving stock");

        match self.reserve(&order).await {
            Ok(()) => {
                tracing::info!(order_ref = %order.order_ref, "stock reserved");
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    order_ref = %order.order_ref,
                    error = %err,
                    "stock reservation failed"
                );
                if let Err(mark_err) = self
                    .store
                    .transition_order(order_id, OrderStatus::Failed)
                    .await
                {
                    tracing::warn!(
                        order_ref = %order.order_ref,
                        error = %mark_err,
                        "could not mark order failed"
                    );
                }
                metrics::counter!("saga_step_failures", "step" => "reserve_stock").increment(1);
                Err(err)
            }
        }
    }

    async fn reserve(&self, order: &Order) -> Result<(), SagaError> {
        self.store
            .reserve_stock(order, self.config.reservation_ttl, self.config.seed_stock)
            .await?;
        self.store
            .transition_order(order.id, OrderStatus::Reserved)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for ReserveStock<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: OrderTask = serde_json::from_value(payload)?;
        self.run(task.order_id).await.map_err(TaskError::from)
    }
}

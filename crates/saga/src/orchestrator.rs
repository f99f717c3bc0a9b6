//! Fulfillment workflow orchestration.

use std::sync::Arc;

use common::OrderId;
use queue::TaskQueue;
use store::Datastore;

use crate::error::SagaError;
use crate::jobs::{
    QUEUE_ORDERS, finalize_order_task, process_payment_task, reserve_stock_task,
    rollback_order_task,
};

/// Starts the fulfillment saga for an order.
///
/// The three steps are enqueued as a dependent chain sharing the order id;
/// each runs only after the previous one succeeded, and the rollback
/// compensation is dispatched exactly once if any step exhausts its retry
/// budget.
pub struct Orchestrator<D> {
    store: Arc<D>,
    queue: Arc<TaskQueue>,
}

impl<D: Datastore> Orchestrator<D> {
    /// Creates a new orchestrator.
    pub fn new(store: Arc<D>, queue: Arc<TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Enqueues `ReserveStock -> ProcessPayment -> FinalizeOrder` with
    /// `RollbackOrder` as the chain's compensation.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, order_id: OrderId) -> Result<(), SagaError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        tracing::info!(order_ref = %order.order_ref, "starting fulfillment workflow");
        self.queue.enqueue_chain(
            QUEUE_ORDERS,
            vec![
                reserve_stock_task(order_id),
                process_payment_task(order_id),
                finalize_order_task(order_id),
            ],
            Some(rollback_order_task(order_id)),
        )?;

        metrics::counter!("fulfillment_workflows_started").increment(1);
        Ok(())
    }
}

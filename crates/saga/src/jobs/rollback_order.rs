//! Compensation: undo an abandoned fulfillment chain.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::OrderStatus;
use queue::{TaskError, TaskHandler, TaskQueue, TaskResult};
use store::Datastore;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::jobs::{OrderTask, QUEUE_NOTIFICATIONS, notification_task};
use crate::services::notify::NotificationKind;

/// Releases the order's reservations (crediting stock back), moves it to
/// `Rollback`, and enqueues a delayed failure notification.
///
/// Idempotent: with nothing left in `Reserved` the release is a no-op and
/// the status transition tolerates a repeat. Errors propagate so the
/// queue retries the rollback itself — compensation is never silently
/// dropped.
pub struct RollbackOrder<D> {
    store: Arc<D>,
    queue: Arc<TaskQueue>,
    config: SagaConfig,
}

impl<D: Datastore> RollbackOrder<D> {
    pub fn new(store: Arc<D>, queue: Arc<TaskQueue>, config: SagaConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, order_id: OrderId) -> Result<(), SagaError> {
        let Some(order) = self.store.order(order_id).await? else {
            tracing::error!(%order_id, "order not found, dropping task");
            return Ok(());
        };
        tracing::warn!(order_ref = %order.order_ref, status = %order.status, "rolling back order");

        let released = self.store.release_reservations(order_id).await?;
        let order = self
            .store
            .transition_order(order_id, OrderStatus::Rollback)
            .await?;

        self.queue.enqueue(
            QUEUE_NOTIFICATIONS,
            notification_task(
                order_id,
                NotificationKind::Failed,
                self.config.notification_delay,
            ),
        );

        metrics::counter!("orders_rolled_back").increment(1);
        tracing::info!(
            order_ref = %order.order_ref,
            released = released.len(),
            "order rolled back"
        );
        Ok(())
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for RollbackOrder<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: OrderTask = serde_json::from_value(payload)?;
        self.run(task.order_id).await.map_err(TaskError::from)
    }
}

//! End-to-end tests for the fulfillment saga and refund pipeline,
//! executed through the real task queue and worker pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Money, Sku};
use domain::{
    Order, OrderDraft, OrderStatus, PaymentStatus, Product, RefundStatus, RefundType,
    ReservationStatus,
};
use queue::{HandlerRegistry, TaskQueue, WorkerConfig, WorkerPool};
use saga::{
    NotificationKind, Orchestrator, RecordingEventSink, RecordingGateway, RecordingNotifier,
    RefundError, RefundRequest, RefundService, SagaConfig, SagaDeps,
};
use store::{Datastore, MemoryStore};

struct TestHarness {
    store: Arc<MemoryStore>,
    queue: Arc<TaskQueue>,
    gateway: Arc<RecordingGateway>,
    notifier: Arc<RecordingNotifier>,
    events: Arc<RecordingEventSink>,
    orchestrator: Orchestrator<MemoryStore>,
    refunds: RefundService<MemoryStore>,
    pool: Option<WorkerPool>,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(TaskQueue::new());
        let gateway = Arc::new(RecordingGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let events = Arc::new(RecordingEventSink::new());

        let deps = SagaDeps {
            store: store.clone(),
            queue: queue.clone(),
            gateway: gateway.clone(),
            notifier: notifier.clone(),
            events: events.clone(),
            config: SagaConfig::immediate(),
        };
        let mut registry = HandlerRegistry::new();
        deps.register_handlers(&mut registry);

        let pool = WorkerPool::start(
            queue.clone(),
            Arc::new(registry),
            vec![
                WorkerConfig::new(saga::QUEUE_ORDERS, 2),
                WorkerConfig::new(saga::QUEUE_REFUNDS, 2),
                WorkerConfig::new(saga::QUEUE_NOTIFICATIONS, 1),
            ],
            Duration::from_millis(50),
        );

        let orchestrator = Orchestrator::new(store.clone(), queue.clone());
        let refunds = RefundService::new(store.clone(), queue.clone());

        Self {
            store,
            queue,
            gateway,
            notifier,
            events,
            orchestrator,
            refunds,
            pool: Some(pool),
        }
    }

    async fn seed_stock(&self, quantity: u32) {
        self.store
            .upsert_product(Product::new(
                "SKU-001",
                "Widget",
                Money::from_cents(1000),
                quantity,
            ))
            .await
            .unwrap();
    }

    async fn create_order(&self, order_ref: &str, quantity: u32, unit_cents: i64) -> Order {
        let order = Order::new(OrderDraft {
            order_ref: order_ref.to_string(),
            customer_id: "CUST-001".to_string(),
            customer_name: "Ada Lovelace".to_string(),
            sku: Sku::new("SKU-001"),
            product_name: "Widget".to_string(),
            quantity,
            unit_price: Money::from_cents(unit_cents),
            currency: "USD".to_string(),
            ordered_at: Utc::now(),
        })
        .unwrap();
        self.store.insert_order(order).await.unwrap()
    }

    async fn drain(&self) {
        for _ in 0..500 {
            if self.queue.is_idle() {
                // One more beat so acked chain tails and notifications land.
                tokio::time::sleep(Duration::from_millis(20)).await;
                if self.queue.is_idle() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue did not drain in time");
    }

    async fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }
    }

    async fn stock(&self) -> u32 {
        self.store
            .product(&Sku::new("SKU-001"))
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn happy_path_completes_order() {
    let h = TestHarness::new();
    h.seed_stock(5).await;
    let order = h.create_order("ORD-1", 2, 1000).await;

    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    let order = h.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(h.stock().await, 3);

    let reservations = h.store.reservations_for_order(order.id).await.unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].status, ReservationStatus::Committed);

    let payment = h.store.latest_payment(order.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.amount, order.total_amount);

    assert_eq!(h.gateway.charge_count(), 1);
    assert_eq!(h.events.completed_orders(), vec![order.id]);
    assert_eq!(h.notifier.count_for(order.id, NotificationKind::Success), 1);

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn payment_declined_on_all_attempts_rolls_back() {
    let h = TestHarness::new();
    h.seed_stock(5).await;
    h.gateway.set_fail_on_charge(true);
    let order = h.create_order("ORD-1", 2, 1000).await;

    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    // Three attempts, then compensation.
    assert_eq!(h.gateway.charge_count(), 3);

    let order = h.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Rollback);
    assert_eq!(h.stock().await, 5);

    let reservations = h.store.reservations_for_order(order.id).await.unwrap();
    assert_eq!(reservations[0].status, ReservationStatus::Released);

    let payment = h.store.latest_payment(order.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    assert!(h.events.completed_orders().is_empty());
    assert_eq!(h.notifier.count_for(order.id, NotificationKind::Failed), 1);
    assert_eq!(h.notifier.count_for(order.id, NotificationKind::Success), 0);

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insufficient_stock_fails_and_rolls_back() {
    let h = TestHarness::new();
    h.seed_stock(1).await;
    let order = h.create_order("ORD-1", 2, 1000).await;

    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    let order = h.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Rollback);
    // No reservation row was created and stock never moved.
    assert!(
        h.store
            .reservations_for_order(order.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.stock().await, 1);
    // Payment was never attempted.
    assert_eq!(h.gateway.charge_count(), 0);
    assert!(h.store.latest_payment(order.id).await.unwrap().is_none());
    assert_eq!(h.notifier.count_for(order.id, NotificationKind::Failed), 1);

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partial_refund_then_overdraw_rejection() {
    let h = TestHarness::new();
    h.seed_stock(5).await;
    let order = h.create_order("ORD-1", 2, 1000).await;
    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    // $8 of the $20 order.
    let refund = h
        .refunds
        .request_refund(RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(800),
            refund_type: RefundType::Partial,
            reason: Some("damaged item".to_string()),
            description: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    h.drain().await;

    let refund = h.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(h.events.completed_refunds(), vec![refund.id]);

    let summary = h.refunds.order_summary("ORD-1").await.unwrap();
    assert_eq!(summary.refundable_amount.cents(), 1200);

    // $15 no longer fits the remaining $12.
    let result = h
        .refunds
        .request_refund(RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(1500),
            refund_type: RefundType::Partial,
            reason: None,
            description: None,
            metadata: serde_json::json!({}),
        })
        .await;
    match result {
        Err(RefundError::AmountExceedsRefundable {
            requested,
            refundable,
        }) => {
            assert_eq!(requested.cents(), 1500);
            assert_eq!(refundable.cents(), 1200);
        }
        other => panic!("expected AmountExceedsRefundable, got {other:?}"),
    }

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_refund_consumes_remaining_balance() {
    let h = TestHarness::new();
    h.seed_stock(5).await;
    let order = h.create_order("ORD-1", 2, 1000).await;
    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    // Partial first, then a full refund of exactly the remainder.
    h.refunds
        .request_refund(RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(800),
            refund_type: RefundType::Partial,
            reason: None,
            description: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    h.drain().await;

    let full = h
        .refunds
        .request_refund(RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(1200),
            refund_type: RefundType::Full,
            reason: None,
            description: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    h.drain().await;

    let full = h.store.refund(full.id).await.unwrap().unwrap();
    assert_eq!(full.status, RefundStatus::Completed);

    let summary = h.refunds.order_summary("ORD-1").await.unwrap();
    assert!(summary.is_fully_refunded);
    assert_eq!(summary.refundable_amount.cents(), 0);
    assert_eq!(summary.total_refunded, order.total_amount);
    assert_eq!(h.events.completed_refunds().len(), 2);

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn declined_refund_can_be_retried_by_operator() {
    let h = TestHarness::new();
    h.seed_stock(5).await;
    let order = h.create_order("ORD-1", 2, 1000).await;
    h.orchestrator.start(order.id).await.unwrap();
    h.drain().await;

    h.gateway.set_fail_on_refund(true);
    let refund = h
        .refunds
        .request_refund(RefundRequest {
            order_ref: "ORD-1".to_string(),
            amount: Money::from_cents(800),
            refund_type: RefundType::Partial,
            reason: None,
            description: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    h.drain().await;

    // All three attempts declined.
    assert_eq!(h.gateway.refund_count(), 3);
    let failed = h.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(failed.status, RefundStatus::Failed);
    assert!(failed.error_message.is_some());

    // Operator retry resets to pending and settles.
    h.gateway.set_fail_on_refund(false);
    h.refunds.retry_refund(&refund.refund_ref).await.unwrap();
    h.drain().await;

    let refund = h.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(h.events.completed_refunds().len(), 1);

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_share_stock_safely() {
    let h = TestHarness::new();
    h.seed_stock(10).await;

    let mut ids = Vec::new();
    for i in 0..15 {
        let order = h.create_order(&format!("ORD-{i:03}"), 1, 1000).await;
        ids.push(order.id);
        h.orchestrator.start(order.id).await.unwrap();
    }
    h.drain().await;

    let mut completed = 0;
    let mut rolled_back = 0;
    for id in ids {
        match h.store.order(id).await.unwrap().unwrap().status {
            OrderStatus::Completed => completed += 1,
            OrderStatus::Rollback => rolled_back += 1,
            other => panic!("order left in non-terminal status {other}"),
        }
    }

    // Ten units of stock, one per order: exactly ten complete.
    assert_eq!(completed, 10);
    assert_eq!(rolled_back, 5);
    assert_eq!(h.stock().await, 0);

    h.shutdown().await;
}

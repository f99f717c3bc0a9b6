//! End-to-end tests running the worker pool against real handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use queue::{
    HandlerRegistry, TaskError, TaskHandler, TaskQueue, TaskResult, TaskSpec, WorkerConfig,
    WorkerPool,
};

/// Handler that counts executions and fails the first `fail_first` of them.
struct Flaky {
    calls: AtomicU32,
    fail_first: u32,
}

impl Flaky {
    fn new(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for Flaky {
    async fn execute(&self, _payload: serde_json::Value) -> TaskResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            return Err(TaskError::new("simulated failure"));
        }
        Ok(())
    }
}

/// Handler that sleeps longer than any per-attempt timeout.
struct Stuck;

#[async_trait]
impl TaskHandler for Stuck {
    async fn execute(&self, _payload: serde_json::Value) -> TaskResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

async fn wait_until_idle(queue: &TaskQueue) {
    for _ in 0..500 {
        if queue.is_idle() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not drain in time");
}

fn start_pool(queue: &Arc<TaskQueue>, registry: HandlerRegistry) -> WorkerPool {
    WorkerPool::start(
        queue.clone(),
        Arc::new(registry),
        vec![WorkerConfig::new("orders", 2)],
        Duration::from_millis(50),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flaky_task_succeeds_within_budget() {
    let queue = Arc::new(TaskQueue::new());
    let flaky = Flaky::new(2);

    let mut registry = HandlerRegistry::new();
    registry.register("flaky", flaky.clone());
    let pool = start_pool(&queue, registry);

    queue.enqueue(
        "orders",
        TaskSpec::new("flaky", serde_json::json!({})).with_max_attempts(3),
    );

    wait_until_idle(&queue).await;
    pool.shutdown().await;

    // Two failures then one success.
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chain_abandonment_runs_compensation() {
    let queue = Arc::new(TaskQueue::new());
    let step_a = Flaky::new(0);
    let step_b = Flaky::new(u32::MAX); // never succeeds
    let step_c = Flaky::new(0);
    let compensation = Flaky::new(0);

    let mut registry = HandlerRegistry::new();
    registry.register("a", step_a.clone());
    registry.register("b", step_b.clone());
    registry.register("c", step_c.clone());
    registry.register("compensate", compensation.clone());
    let pool = start_pool(&queue, registry);

    queue
        .enqueue_chain(
            "orders",
            vec![
                TaskSpec::new("a", serde_json::json!({})),
                TaskSpec::new("b", serde_json::json!({})).with_max_attempts(3),
                TaskSpec::new("c", serde_json::json!({})),
            ],
            Some(TaskSpec::new("compensate", serde_json::json!({}))),
        )
        .unwrap();

    wait_until_idle(&queue).await;
    pool.shutdown().await;

    assert_eq!(step_a.calls(), 1);
    assert_eq!(step_b.calls(), 3);
    // The chain stopped before "c", and compensation ran exactly once.
    assert_eq!(step_c.calls(), 0);
    assert_eq!(compensation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn attempt_timeout_counts_against_budget() {
    let queue = Arc::new(TaskQueue::new().with_visibility_grace(Duration::from_millis(100)));
    let mut registry = HandlerRegistry::new();
    registry.register("stuck", Arc::new(Stuck));
    let pool = start_pool(&queue, registry);

    queue.enqueue(
        "orders",
        TaskSpec::new("stuck", serde_json::json!({}))
            .with_timeout(Duration::from_millis(50))
            .with_max_attempts(2),
    );

    wait_until_idle(&queue).await;
    pool.shutdown().await;

    // Nothing left: both attempts timed out and the task was abandoned.
    assert!(queue.is_idle());
}

//! Worker pool pulling tasks from the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::handler::HandlerRegistry;
use crate::queue::{FailureOutcome, TaskQueue};
use crate::task::Delivery;

/// Worker configuration for one named queue.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue: String,
    pub concurrency: usize,
    /// How long an idle worker sleeps between polls when no wake-up
    /// arrives.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    /// Creates a config with a 100 ms poll interval.
    pub fn new(queue: impl Into<String>, concurrency: usize) -> Self {
        Self {
            queue: queue.into(),
            concurrency: concurrency.max(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A pool of tokio workers plus a reclaim loop.
///
/// Each worker wraps handler execution in `tokio::time::timeout` with the
/// task's own per-attempt timeout; an elapsed timeout counts as a failed
/// attempt exactly like a handler error. The reclaim loop periodically
/// requeues deliveries lost to crashed or stalled workers.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns workers for each config plus one reclaim loop.
    pub fn start(
        queue: Arc<TaskQueue>,
        registry: Arc<HandlerRegistry>,
        configs: Vec<WorkerConfig>,
        reclaim_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        for config in configs {
            for worker in 0..config.concurrency {
                let queue = queue.clone();
                let registry = registry.clone();
                let config = config.clone();
                let rx = shutdown.subscribe();
                handles.push(tokio::spawn(async move {
                    tracing::debug!(queue = %config.queue, worker, "worker started");
                    worker_loop(queue, registry, config, rx).await;
                }));
            }
        }

        let rx = shutdown.subscribe();
        let reclaim_queue = queue.clone();
        handles.push(tokio::spawn(async move {
            reclaim_loop(reclaim_queue, reclaim_interval, rx).await;
        }));

        Self { shutdown, handles }
    }

    /// Signals all workers to stop and waits for them to finish their
    /// current delivery.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    queue: Arc<TaskQueue>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        match queue.pop(&config.queue) {
            Some(delivery) => run_delivery(&queue, &registry, delivery).await,
            None => {
                tokio::select! {
                    _ = queue.notified() => {}
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        // A dropped sender means the pool is gone.
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn reclaim_loop(
    queue: Arc<TaskQueue>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                queue.reclaim_expired();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn run_delivery(queue: &TaskQueue, registry: &HandlerRegistry, delivery: Delivery) {
    let Some(handler) = registry.get(&delivery.name) else {
        tracing::error!(task = %delivery.name, "no handler registered");
        report_failure(queue, &delivery, "no handler registered");
        return;
    };

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(delivery.timeout, handler.execute(delivery.payload.clone())).await;
    metrics::histogram!("queue_task_duration_seconds").record(started.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(task = %delivery.name, attempt = delivery.attempt, "task completed");
            queue.ack(delivery.id);
        }
        Ok(Err(err)) => {
            report_failure(queue, &delivery, err.message());
        }
        Err(_elapsed) => {
            report_failure(queue, &delivery, "attempt timed out");
        }
    }
}

fn report_failure(queue: &TaskQueue, delivery: &Delivery, reason: &str) {
    match queue.fail(delivery.id) {
        FailureOutcome::Retried { next_attempt } => {
            tracing::warn!(
                task = %delivery.name,
                attempt = delivery.attempt,
                next_attempt,
                reason,
                "task attempt failed, retrying"
            );
        }
        FailureOutcome::Abandoned {
            compensation_enqueued,
        } => {
            tracing::error!(
                task = %delivery.name,
                attempt = delivery.attempt,
                compensation_enqueued,
                reason,
                "task abandoned after exhausting retries"
            );
        }
        FailureOutcome::Unknown => {
            tracing::debug!(task = %delivery.name, "stale delivery, ignoring failure");
        }
    }
}

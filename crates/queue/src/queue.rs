//! The task queue itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::QueueError;
use crate::task::{Delivery, TaskId, TaskSpec};

/// Extra time past a task's execution timeout before an unacked delivery
/// is considered lost and eligible for reclaim.
const DEFAULT_VISIBILITY_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChainId(Uuid);

#[derive(Debug)]
struct Chain {
    remaining: VecDeque<TaskSpec>,
    on_abandon: Option<TaskSpec>,
    queue: String,
}

#[derive(Debug)]
struct QueuedTask {
    id: TaskId,
    queue: String,
    spec: TaskSpec,
    /// 1-based number of the next delivery attempt.
    attempt: u32,
    ready_at: Instant,
    chain: Option<ChainId>,
}

#[derive(Debug)]
struct InFlight {
    task: QueuedTask,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    ready: Vec<QueuedTask>,
    in_flight: HashMap<TaskId, InFlight>,
    chains: HashMap<ChainId, Chain>,
}

/// What happened to a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Requeued for another attempt.
    Retried { next_attempt: u32 },
    /// Retry budget exhausted. `compensation_enqueued` is true when the
    /// task belonged to a chain whose compensation task was dispatched.
    Abandoned { compensation_enqueued: bool },
    /// The delivery id is not in flight (already acked, failed, or
    /// reclaimed under a new id).
    Unknown,
}

/// In-process, at-least-once task queue.
///
/// Popped tasks get a visibility deadline (execution timeout plus a
/// grace); [`TaskQueue::reclaim_expired`] requeues deliveries whose
/// deadline has passed, counting the lost delivery against the retry
/// budget. Within a chain, ordering is strict; across chains and plain
/// tasks nothing is ordered.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    visibility_grace: Duration,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Creates an empty queue with the default visibility grace.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            visibility_grace: DEFAULT_VISIBILITY_GRACE,
        }
    }

    /// Overrides the visibility grace (how long past its timeout an
    /// unacked delivery stays invisible before reclaim).
    pub fn with_visibility_grace(mut self, grace: Duration) -> Self {
        self.visibility_grace = grace;
        self
    }

    /// Enqueues a standalone task on the named queue.
    pub fn enqueue(&self, queue: &str, spec: TaskSpec) -> TaskId {
        let mut inner = self.inner.lock().unwrap();
        let id = push_task(&mut inner, queue, spec, None);
        drop(inner);
        metrics::counter!("queue_tasks_enqueued").increment(1);
        self.notify.notify_waiters();
        id
    }

    /// Enqueues a dependent chain: each task runs only after the previous
    /// one acked, and `on_abandon` is dispatched exactly once if any task
    /// exhausts its retry budget.
    pub fn enqueue_chain(
        &self,
        queue: &str,
        tasks: Vec<TaskSpec>,
        on_abandon: Option<TaskSpec>,
    ) -> Result<TaskId, QueueError> {
        let mut tasks = VecDeque::from(tasks);
        let first = tasks.pop_front().ok_or(QueueError::EmptyChain)?;

        let chain_id = ChainId(Uuid::new_v4());
        let mut inner = self.inner.lock().unwrap();
        inner.chains.insert(
            chain_id,
            Chain {
                remaining: tasks,
                on_abandon,
                queue: queue.to_string(),
            },
        );
        let id = push_task(&mut inner, queue, first, Some(chain_id));
        drop(inner);
        metrics::counter!("queue_tasks_enqueued").increment(1);
        self.notify.notify_waiters();
        Ok(id)
    }

    /// Pops the next due task from the named queue, making it invisible
    /// until it is acked, failed, or its visibility deadline passes.
    pub fn pop(&self, queue: &str) -> Option<Delivery> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let position = inner
            .ready
            .iter()
            .position(|t| t.queue == queue && t.ready_at <= now)?;

        let task = inner.ready.remove(position);
        let delivery = Delivery {
            id: task.id,
            name: task.spec.name.clone(),
            payload: task.spec.payload.clone(),
            attempt: task.attempt,
            max_attempts: task.spec.max_attempts,
            timeout: task.spec.timeout,
            queue: task.queue.clone(),
        };
        let deadline = now + task.spec.timeout + self.visibility_grace;
        inner.in_flight.insert(task.id, InFlight { task, deadline });
        Some(delivery)
    }

    /// Acknowledges a successful delivery, advancing its chain if any.
    /// Returns false if the delivery is no longer known.
    pub fn ack(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(in_flight) = inner.in_flight.remove(&id) else {
            return false;
        };

        metrics::counter!("queue_tasks_completed").increment(1);
        if let Some(chain_id) = in_flight.task.chain {
            let next = inner.chains.get_mut(&chain_id).and_then(|chain| {
                chain
                    .remaining
                    .pop_front()
                    .map(|spec| (chain.queue.clone(), spec))
            });
            match next {
                Some((queue, spec)) => {
                    push_task(&mut inner, &queue, spec, Some(chain_id));
                    drop(inner);
                    self.notify.notify_waiters();
                }
                None => {
                    inner.chains.remove(&chain_id);
                }
            }
        }
        true
    }

    /// Records a failed delivery: requeues it while budget remains,
    /// otherwise abandons it and dispatches its chain's compensation.
    pub fn fail(&self, id: TaskId) -> FailureOutcome {
        let mut inner = self.inner.lock().unwrap();
        let Some(in_flight) = inner.in_flight.remove(&id) else {
            return FailureOutcome::Unknown;
        };
        let outcome = settle_failure(&mut inner, in_flight.task);
        drop(inner);
        self.notify.notify_waiters();
        outcome
    }

    /// Requeues every in-flight delivery whose visibility deadline has
    /// passed (worker crashed or stalled), counting the lost delivery
    /// against the retry budget. Returns how many were reclaimed.
    pub fn reclaim_expired(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<TaskId> = inner
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let count = expired.len();
        for id in expired {
            if let Some(in_flight) = inner.in_flight.remove(&id) {
                tracing::warn!(
                    task = %in_flight.task.spec.name,
                    attempt = in_flight.task.attempt,
                    "delivery visibility timeout, reclaiming"
                );
                metrics::counter!("queue_tasks_reclaimed").increment(1);
                settle_failure(&mut inner, in_flight.task);
            }
        }
        if count > 0 {
            drop(inner);
            self.notify.notify_waiters();
        }
        count
    }

    /// Number of tasks waiting (due or delayed) on the named queue.
    pub fn pending(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .ready
            .iter()
            .filter(|t| t.queue == queue)
            .count()
    }

    /// True when nothing is waiting or in flight on any queue.
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.ready.is_empty() && inner.in_flight.is_empty()
    }

    /// Waits until new work may be available.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

fn push_task(inner: &mut Inner, queue: &str, spec: TaskSpec, chain: Option<ChainId>) -> TaskId {
    let id = TaskId::new();
    let ready_at = Instant::now() + spec.delay;
    inner.ready.push(QueuedTask {
        id,
        queue: queue.to_string(),
        spec,
        attempt: 1,
        ready_at,
        chain,
    });
    id
}

/// Shared failure path for explicit failures and reclaimed deliveries.
fn settle_failure(inner: &mut Inner, mut task: QueuedTask) -> FailureOutcome {
    if task.attempt < task.spec.max_attempts {
        task.attempt += 1;
        // Redeliver under a fresh id so a stale ack cannot target it.
        task.id = TaskId::new();
        task.ready_at = Instant::now();
        let next_attempt = task.attempt;
        inner.ready.push(task);
        metrics::counter!("queue_tasks_retried").increment(1);
        return FailureOutcome::Retried { next_attempt };
    }

    metrics::counter!("queue_tasks_abandoned").increment(1);
    let mut compensation_enqueued = false;
    if let Some(chain_id) = task.chain
        && let Some(chain) = inner.chains.remove(&chain_id)
        && let Some(spec) = chain.on_abandon
    {
        tracing::warn!(
            task = %task.spec.name,
            compensation = %spec.name,
            "chain abandoned, dispatching compensation"
        );
        push_task(inner, &chain.queue, spec, None);
        compensation_enqueued = true;
    }
    FailureOutcome::Abandoned {
        compensation_enqueued,
    }
}

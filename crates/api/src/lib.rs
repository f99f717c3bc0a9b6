//! HTTP API server for the fulfillment system.
//!
//! Thin glue over the core: order intake (which starts the fulfillment
//! workflow), the refund entry point, read endpoints, health, and
//! Prometheus metrics, with structured logging via tracing.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use queue::{HandlerRegistry, TaskQueue, WorkerConfig, WorkerPool};
use saga::{
    LogEventSink, LogNotifier, Orchestrator, RefundService, SagaConfig, SagaDeps, StubGateway,
};
use store::{Datastore, MemoryStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<D: Datastore + 'static>(
    state: Arc<AppState<D>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<D>))
        .route("/orders/{order_ref}", get(routes::orders::get::<D>))
        .route(
            "/orders/{order_ref}/refunds",
            get(routes::refunds::for_order::<D>),
        )
        .route("/refunds", post(routes::refunds::create::<D>))
        .route("/refunds/{refund_ref}", get(routes::refunds::get::<D>))
        .route(
            "/refunds/{refund_ref}/cancel",
            post(routes::refunds::cancel::<D>),
        )
        .route(
            "/refunds/{refund_ref}/retry",
            post(routes::refunds::retry::<D>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the default runtime: in-memory store, task queue, gateway stub,
/// saga handlers, and the worker pool. Must be called inside a tokio
/// runtime (the pool spawns workers immediately).
pub fn create_default_state(config: &Config) -> (Arc<AppState<MemoryStore>>, WorkerPool) {
    let store = Arc::new(MemoryStore::new());
    let task_queue = Arc::new(TaskQueue::new());

    let deps = SagaDeps {
        store: store.clone(),
        queue: task_queue.clone(),
        gateway: Arc::new(StubGateway::new(
            config.charge_success_rate,
            config.refund_success_rate,
            config.gateway_min_latency,
            config.gateway_max_latency,
        )),
        notifier: Arc::new(LogNotifier::new()),
        events: Arc::new(LogEventSink::new()),
        config: SagaConfig::default(),
    };
    let mut registry = HandlerRegistry::new();
    deps.register_handlers(&mut registry);

    let pool = WorkerPool::start(
        task_queue.clone(),
        Arc::new(registry),
        vec![
            WorkerConfig::new(saga::QUEUE_ORDERS, config.order_workers),
            WorkerConfig::new(saga::QUEUE_REFUNDS, config.refund_workers),
            WorkerConfig::new(saga::QUEUE_NOTIFICATIONS, config.notification_workers),
        ],
        Duration::from_secs(1),
    );

    let state = Arc::new(AppState {
        store: store.clone(),
        queue: task_queue.clone(),
        orchestrator: Orchestrator::new(store.clone(), task_queue.clone()),
        refunds: RefundService::new(store, task_queue),
    });

    (state, pool)
}

//! Saga orchestrator: drives the order fulfillment saga over a message
//! bus and an append-only event log, and exposes health and metrics
//! endpoints for operators.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use event_store::EventLogStore;
use messaging::MessageBus;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::Orchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates the Axum application router for the orchestrator's
/// operator-facing surface: health and Prometheus metrics.
///
/// The saga itself is driven entirely off the message bus (see
/// `main.rs`'s consumer loops), not through this HTTP surface.
pub fn create_app(metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the orchestrator engine from an event log and a message bus.
pub fn create_orchestrator<E, M>(
    event_log: Arc<E>,
    bus: Arc<M>,
    ingress_topic: impl Into<String>,
    outcome_topic: impl Into<String>,
) -> Orchestrator<E, M>
where
    E: EventLogStore,
    M: MessageBus,
{
    Orchestrator::new(event_log, bus, ingress_topic, outcome_topic)
}

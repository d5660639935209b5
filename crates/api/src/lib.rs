//! HTTP API server with observability for the partnership service.
//!
//! Provides REST endpoints for the partnership lifecycle, the periodic
//! outbox retry sweep, structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod sweep;

use std::sync::Arc;

use application::{Outbox, PartnershipService};
use axum::Router;
use axum::routing::{get, post, put};
use messaging::{Broker, EventPublisher, MessagingConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::PartnershipStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::partnerships::{self, AppState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, B>(state: Arc<AppState<S, B>>, metrics_handle: PrometheusHandle) -> Router
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, B>))
        .route("/partnerships", post(partnerships::create::<S, B>))
        .route("/partnerships/{id}", get(partnerships::get::<S, B>))
        .route(
            "/partnerships/{id}/negotiation",
            put(partnerships::start_negotiation::<S, B>),
        )
        .route(
            "/partnerships/{id}/activation",
            put(partnerships::activate::<S, B>),
        )
        .route(
            "/partnerships/{id}/reactivation",
            put(partnerships::reactivate::<S, B>),
        )
        .route(
            "/partnerships/{id}/suspension",
            put(partnerships::suspend::<S, B>),
        )
        .route(
            "/partnerships/{id}/termination",
            put(partnerships::terminate::<S, B>),
        )
        .route(
            "/partnerships/{id}/renewal",
            put(partnerships::renew::<S, B>),
        )
        .route(
            "/partnerships/{id}/level",
            put(partnerships::update_level::<S, B>),
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

/// Wires the publisher, outbox and partnership service over a store and a
/// broker.
pub fn create_state<S, B>(
    store: Arc<S>,
    broker: Arc<B>,
    config: &Config,
    messaging: &MessagingConfig,
) -> Arc<AppState<S, B>>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let publisher = EventPublisher::new(
        broker,
        messaging.routing_table(),
        messaging.service_name.clone(),
    );
    let outbox = Arc::new(Outbox::new(Arc::new(publisher)));
    let service = PartnershipService::new(store, outbox)
        .with_blocked_brands(config.blocked_brands.iter().copied());

    Arc::new(AppState {
        service: Arc::new(service),
    })
}

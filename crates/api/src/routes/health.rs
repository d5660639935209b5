//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use messaging::Broker;
use serde::Serialize;
use storage::PartnershipStore;

use super::partnerships::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// Events stored but not yet accepted by the broker.
    pub outbox_pending: usize,
}

/// GET /health: returns service health and the outbox backlog.
pub async fn check<S, B>(State(state): State<Arc<AppState<S, B>>>) -> Json<HealthResponse>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    Json(HealthResponse {
        status: "ok",
        outbox_pending: state.service.outbox().pending().await,
    })
}

//! Partnership command and query endpoints.
//!
//! Each mutation builds one command and hands it to the service; the
//! response is the command receipt with `202 Accepted`.

use std::sync::Arc;

use application::{CommandReceipt, PartnershipService};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    ActivatePartnership, BrandId, CreatePartnership, PartnerId, Partnership, PartnershipCommand,
    ReactivatePartnership, RenewPartnership, StartNegotiation, SuspendPartnership,
    TerminatePartnership, TransitionOutcome, UpdateLevel,
};
use messaging::Broker;
use serde::{Deserialize, Serialize};
use storage::PartnershipStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: PartnershipStore, B: Broker> {
    pub service: Arc<PartnershipService<S, B>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePartnershipRequest {
    #[serde(default, alias = "id")]
    pub partnership_id: Option<String>,
    #[serde(alias = "id_marca")]
    pub brand_id: String,
    #[serde(alias = "id_partner")]
    pub partner_id: String,
    #[serde(alias = "tipo_partnership")]
    pub partnership_type: String,
    #[serde(default, alias = "terminos_contrato")]
    pub terms: String,
    #[serde(default, alias = "comision_porcentaje")]
    pub commission_rate: f64,
    #[serde(default, alias = "metas_mensuales")]
    pub monthly_goal: u32,
    #[serde(default, alias = "beneficios_adicionales")]
    pub benefits: String,
    #[serde(default, alias = "notas")]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct NegotiationRequest {
    #[serde(default, alias = "terminos")]
    pub terms: String,
}

#[derive(Deserialize)]
pub struct ActivationRequest {
    #[serde(alias = "comision_porcentaje")]
    pub commission_rate: f64,
    #[serde(default, alias = "metas_mensuales")]
    pub monthly_goal: u32,
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    #[serde(default, alias = "motivo")]
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RenewalRequest {
    #[serde(alias = "nueva_fecha_fin")]
    pub new_end_date: DateTime<Utc>,
    #[serde(default, alias = "nuevos_terminos")]
    pub new_terms: Option<String>,
}

#[derive(Deserialize)]
pub struct LevelRequest {
    #[serde(alias = "nuevo_nivel")]
    pub new_level: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ReceiptResponse {
    pub partnership_id: String,
    pub command: &'static str,
    pub outcome: &'static str,
    pub state: &'static str,
    pub published: usize,
    pub deferred: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
}

impl From<CommandReceipt> for ReceiptResponse {
    fn from(receipt: CommandReceipt) -> Self {
        let state = match receipt.outcome {
            TransitionOutcome::Applied => receipt.state,
            TransitionOutcome::Ignored { current } => current,
        };
        Self {
            partnership_id: receipt.partnership_id.to_string(),
            command: receipt.command,
            outcome: receipt.outcome.as_str(),
            state: state.as_str(),
            published: receipt.published,
            deferred: receipt.deferred,
            publish_error: receipt.publish_error,
        }
    }
}

#[derive(Serialize)]
pub struct PartnershipResponse {
    pub id: String,
    pub brand_id: String,
    pub partner_id: String,
    pub partnership_type: &'static str,
    pub state: &'static str,
    pub level: &'static str,
    pub terms: String,
    pub commission_rate: f64,
    pub monthly_goal: u32,
    pub benefits: String,
    pub notes: String,
    pub created_at: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub last_activity_at: String,
}

impl From<&Partnership> for PartnershipResponse {
    fn from(p: &Partnership) -> Self {
        use domain::AggregateRoot;

        Self {
            id: p.id().to_string(),
            brand_id: p.brand_id().to_string(),
            partner_id: p.partner_id().to_string(),
            partnership_type: p.partnership_type().as_str(),
            state: p.state().as_str(),
            level: p.level().as_str(),
            terms: p.terms().to_string(),
            commission_rate: p.commission_rate(),
            monthly_goal: p.monthly_goal(),
            benefits: p.benefits().to_string(),
            notes: p.notes().to_string(),
            created_at: p.created_at().to_rfc3339(),
            started_at: p.started_at().to_rfc3339(),
            ended_at: p.ended_at().map(|t| t.to_rfc3339()),
            last_activity_at: p.last_activity_at().to_rfc3339(),
        }
    }
}

type Accepted = (StatusCode, Json<ReceiptResponse>);

async fn execute<S, B>(
    state: &AppState<S, B>,
    command: impl Into<PartnershipCommand>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let receipt = state.service.execute(command.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt.into())))
}

// -- Handlers --

/// POST /partnerships: register a new partnership.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreatePartnershipRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let brand_id = BrandId::from_uuid(parse_uuid("brand_id", &req.brand_id)?);
    let partner_id = PartnerId::from_uuid(parse_uuid("partner_id", &req.partner_id)?);

    let mut cmd = CreatePartnership::new(brand_id, partner_id, req.partnership_type);
    if let Some(id) = req.partnership_id.as_deref() {
        cmd = cmd.with_id(parse_aggregate_id(id)?);
    }
    cmd.terms = req.terms;
    cmd.commission_rate = req.commission_rate;
    cmd.monthly_goal = req.monthly_goal;
    cmd.benefits = req.benefits;
    cmd.notes = req.notes;

    execute(&state, cmd).await
}

/// GET /partnerships/{id}: load a partnership.
#[tracing::instrument(skip(state))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<PartnershipResponse>, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    let partnership = state
        .service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Partnership {id} not found")))?;

    Ok(Json(PartnershipResponse::from(&partnership)))
}

/// PUT /partnerships/{id}/negotiation
#[tracing::instrument(skip(state, req))]
pub async fn start_negotiation<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<NegotiationRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(&state, StartNegotiation::new(id, req.terms)).await
}

/// PUT /partnerships/{id}/activation
#[tracing::instrument(skip(state, req))]
pub async fn activate<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<ActivationRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(
        &state,
        ActivatePartnership::new(id, req.commission_rate, req.monthly_goal),
    )
    .await
}

/// PUT /partnerships/{id}/reactivation
#[tracing::instrument(skip(state))]
pub async fn reactivate<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(&state, ReactivatePartnership::new(id)).await
}

/// PUT /partnerships/{id}/suspension
#[tracing::instrument(skip(state, req))]
pub async fn suspend<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(&state, SuspendPartnership::new(id, req.reason)).await
}

/// PUT /partnerships/{id}/termination
#[tracing::instrument(skip(state, req))]
pub async fn terminate<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(&state, TerminatePartnership::new(id, req.reason)).await
}

/// PUT /partnerships/{id}/renewal
#[tracing::instrument(skip(state, req))]
pub async fn renew<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<RenewalRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(
        &state,
        RenewPartnership::new(id, req.new_end_date, req.new_terms),
    )
    .await
}

/// PUT /partnerships/{id}/level
#[tracing::instrument(skip(state, req))]
pub async fn update_level<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<LevelRequest>,
) -> Result<Accepted, ApiError>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let id = parse_aggregate_id(&id)?;
    execute(&state, UpdateLevel::new(id, req.new_level)).await
}

fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(value).map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = parse_uuid("ID format", id)?;
    Ok(AggregateId::from(uuid))
}

//! Inbound saga events re-entering the partnership service.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{BrandId, CreatePartnership, PartnerId};
use messaging::{
    Broker, EventConsumer, EventEnvelope, EventHandler, EventStatus, HandlerError,
    MessagingConfig, kinds,
};
use serde::Deserialize;
use storage::PartnershipStore;
use uuid::Uuid;

use crate::error::ApplicationError;
use crate::service::PartnershipService;

/// Partnership type assumed when an inbound request names none.
const DEFAULT_PARTNERSHIP_TYPE: &str = "marca_embajador";

/// Fields of an inbound creation request.
///
/// Accepts this service's field names and the upstream wire names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreatePartnerPayload {
    #[serde(alias = "id_partnership")]
    partnership_id: Option<Uuid>,
    #[serde(alias = "id_marca")]
    brand_id: Option<Uuid>,
    #[serde(alias = "id_partner")]
    partner_id: Option<Uuid>,
    #[serde(alias = "tipo_partnership")]
    partnership_type: Option<String>,
    #[serde(alias = "terminos_contrato")]
    terms: Option<String>,
    #[serde(alias = "comision_porcentaje")]
    commission_rate: Option<f64>,
    #[serde(alias = "metas_mensuales")]
    monthly_goal: Option<u32>,
    #[serde(alias = "beneficios_adicionales")]
    benefits: Option<String>,
    #[serde(alias = "notas")]
    notes: Option<String>,
}

/// Builds the create command an inbound `CommandCreatePartner` asks for.
///
/// Missing identities get fresh IDs; the envelope's correlation ID travels
/// with the command.
fn create_command(envelope: &EventEnvelope) -> Result<CreatePartnership, serde_json::Error> {
    let payload: CreatePartnerPayload = if envelope.event_data.is_null() {
        CreatePartnerPayload::default()
    } else {
        serde_json::from_value(envelope.event_data.clone())?
    };

    let mut cmd = CreatePartnership::new(
        payload.brand_id.map(BrandId::from_uuid).unwrap_or_default(),
        payload.partner_id.map(PartnerId::from_uuid).unwrap_or_default(),
        payload
            .partnership_type
            .unwrap_or_else(|| DEFAULT_PARTNERSHIP_TYPE.to_string()),
    );
    if let Some(id) = payload.partnership_id {
        cmd = cmd.with_id(AggregateId::from_uuid(id));
    }
    cmd.correlation_id = envelope.correlation_id;
    cmd.terms = payload.terms.unwrap_or_default();
    cmd.commission_rate = payload.commission_rate.unwrap_or(0.0);
    cmd.monthly_goal = payload.monthly_goal.unwrap_or(0);
    cmd.benefits = payload.benefits.unwrap_or_default();
    cmd.notes = payload.notes.unwrap_or_default();

    Ok(cmd)
}

/// Executes the local create command for an upstream creation request.
///
/// Safe to replay: a request for a partnership that already exists is
/// treated as processed.
pub struct EventProcessingService<S: PartnershipStore, B: Broker> {
    service: Arc<PartnershipService<S, B>>,
}

impl<S: PartnershipStore, B: Broker> EventProcessingService<S, B> {
    pub fn new(service: Arc<PartnershipService<S, B>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, B> EventHandler for EventProcessingService<S, B>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    #[tracing::instrument(skip(self, envelope), fields(correlation_id = ?envelope.correlation_id))]
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let cmd = create_command(envelope)
            .map_err(|e| HandlerError::Rejected(format!("invalid creation payload: {e}")))?;
        let partnership_id = cmd.partnership_id;

        match self.service.execute(cmd.into()).await {
            Ok(receipt) => {
                tracing::info!(%partnership_id, state = receipt.state.as_str(), "saga creation processed");
                Ok(())
            }
            Err(ApplicationError::AlreadyExists(_)) => {
                tracing::info!(%partnership_id, "partnership already exists, request already processed");
                Ok(())
            }
            Err(e) if e.is_rejection() => Err(HandlerError::Rejected(e.to_string())),
            Err(e) => Err(HandlerError::Retryable(e.to_string())),
        }
    }
}

/// Logs lifecycle announcements from other services.
pub struct LifecycleEventLogger;

#[async_trait]
impl EventHandler for LifecycleEventLogger {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let partnership_id = envelope
            .event_data
            .get("partnership_id")
            .or_else(|| envelope.event_data.get("id_partnership"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        tracing::info!(
            event_type = %envelope.event_type,
            status = %envelope.status,
            partnership_id,
            "partnership lifecycle event received"
        );
        Ok(())
    }
}

/// Builds the consumer closing the creation saga.
///
/// `CommandCreatePartner` with status `success` re-enters the service;
/// activation, suspension and termination announcements are logged;
/// everything else is acknowledged and ignored.
pub fn saga_consumer<S, B>(
    service: Arc<PartnershipService<S, B>>,
    broker: Arc<B>,
    config: &MessagingConfig,
) -> EventConsumer<B>
where
    S: PartnershipStore + 'static,
    B: Broker,
{
    let processing = Arc::new(EventProcessingService::new(service));
    let logger = Arc::new(LifecycleEventLogger);

    EventConsumer::new(
        broker,
        config.routing_table(),
        config.inbound_topics.clone(),
        config.receive_timeout,
    )
    .on_status(kinds::COMMAND_CREATE_PARTNER, EventStatus::Success, processing)
    .on(kinds::PARTNERSHIP_ACTIVATED, logger.clone())
    .on(kinds::PARTNERSHIP_SUSPENDED, logger.clone())
    .on(kinds::PARTNERSHIP_TERMINATED, logger)
}

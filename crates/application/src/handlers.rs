//! Command handlers.
//!
//! Each handler loads or builds the aggregate inside a unit of work, runs one
//! transition, and registers the resulting storage operation and events.
//! Handlers never publish; the unit of work does that after commit.

use std::collections::HashSet;

use common::AggregateId;
use domain::{
    ActivatePartnership, AggregateRoot, BrandId, CreatePartnership, NewPartnership, Partnership,
    PartnershipCommand, PartnershipLevel, PartnershipType, ReactivatePartnership,
    RenewPartnership, StartNegotiation, SuspendPartnership, TerminatePartnership,
    TransitionOutcome, UpdateLevel,
};
use messaging::{Broker, EventStatus, kinds};
use storage::{StorageOperation, StoreTransaction};

use crate::error::ApplicationError;
use crate::outbox::PendingEvent;
use crate::unit_of_work::UnitOfWork;
use crate::Result;

/// The aggregate after a handler ran, and whether its transition applied.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub partnership: Partnership,
    pub outcome: TransitionOutcome,
}

/// Routes a command to its handler.
pub async fn dispatch<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    command: &PartnershipCommand,
    blocked_brands: &HashSet<BrandId>,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    match command {
        PartnershipCommand::Create(cmd) => create(uow, cmd, blocked_brands).await,
        PartnershipCommand::StartNegotiation(cmd) => start_negotiation(uow, cmd).await,
        PartnershipCommand::Activate(cmd) => activate(uow, cmd).await,
        PartnershipCommand::Reactivate(cmd) => reactivate(uow, cmd).await,
        PartnershipCommand::Suspend(cmd) => suspend(uow, cmd).await,
        PartnershipCommand::Terminate(cmd) => terminate(uow, cmd).await,
        PartnershipCommand::Renew(cmd) => renew(uow, cmd).await,
        PartnershipCommand::UpdateLevel(cmd) => update_level(uow, cmd).await,
    }
}

/// Registers a new partnership and queues its creation notice.
///
/// The notice goes out as `EventPartnerCreated` with the saga correlation ID
/// of the command, if any.
pub async fn create<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &CreatePartnership,
    blocked_brands: &HashSet<BrandId>,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    if blocked_brands.contains(&cmd.brand_id) {
        return Err(ApplicationError::BlockedBrand(cmd.brand_id));
    }

    let partnership_type: PartnershipType = cmd.partnership_type.parse()?;

    if uow.load_for_update(cmd.partnership_id).await?.is_some() {
        return Err(ApplicationError::AlreadyExists(cmd.partnership_id));
    }

    let partnership = Partnership::create(NewPartnership {
        id: cmd.partnership_id,
        brand_id: cmd.brand_id,
        partner_id: cmd.partner_id,
        partnership_type,
        terms: cmd.terms.clone(),
        commission_rate: cmd.commission_rate,
        monthly_goal: cmd.monthly_goal,
        benefits: cmd.benefits.clone(),
        notes: cmd.notes.clone(),
    })?;

    uow.register(StorageOperation::insert(&partnership));
    uow.register_event(
        PendingEvent::new(
            partnership.creation_notice(),
            kinds::EVENT_PARTNER_CREATED,
            EventStatus::Success,
        )
        .correlated(cmd.correlation_id),
    );

    tracing::info!(
        partnership_id = %partnership.id(),
        partnership_type = partnership_type.as_str(),
        "partnership created"
    );

    Ok(HandlerOutcome {
        partnership,
        outcome: TransitionOutcome::Applied,
    })
}

pub async fn start_negotiation<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &StartNegotiation,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let terms = cmd.terms.clone();
    transition(uow, cmd.partnership_id, |p| Ok(p.start_negotiation(terms))).await
}

pub async fn activate<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &ActivatePartnership,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let (rate, goal) = (cmd.commission_rate, cmd.monthly_goal);
    transition(uow, cmd.partnership_id, |p| Ok(p.activate(rate, goal)?)).await
}

pub async fn reactivate<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &ReactivatePartnership,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    transition(uow, cmd.partnership_id, |p| Ok(p.reactivate())).await
}

pub async fn suspend<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &SuspendPartnership,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let reason = cmd.reason.clone();
    transition(uow, cmd.partnership_id, |p| Ok(p.suspend(reason))).await
}

pub async fn terminate<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &TerminatePartnership,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let reason = cmd.reason.clone();
    transition(uow, cmd.partnership_id, |p| Ok(p.terminate(reason))).await
}

pub async fn renew<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &RenewPartnership,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let (end, terms) = (cmd.new_end_date, cmd.new_terms.clone());
    transition(uow, cmd.partnership_id, |p| Ok(p.renew(end, terms)?)).await
}

pub async fn update_level<T, B>(
    uow: &mut UnitOfWork<'_, T, B>,
    cmd: &UpdateLevel,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
{
    let level: PartnershipLevel = cmd.new_level.parse()?;
    transition(uow, cmd.partnership_id, |p| Ok(p.update_level(level))).await
}

/// Loads and locks a partnership, applies `apply`, and registers the update
/// and its events if the transition took effect.
async fn transition<T, B, F>(
    uow: &mut UnitOfWork<'_, T, B>,
    id: AggregateId,
    apply: F,
) -> Result<HandlerOutcome>
where
    T: StoreTransaction,
    B: Broker,
    F: FnOnce(&mut Partnership) -> Result<TransitionOutcome>,
{
    let mut partnership = uow
        .load_for_update(id)
        .await?
        .ok_or(ApplicationError::NotFound(id))?;

    let outcome = apply(&mut partnership)?;

    match outcome {
        TransitionOutcome::Applied => {
            uow.register(StorageOperation::update(&partnership));
            for event in partnership.take_pending_events() {
                uow.register_event(PendingEvent::transition(event));
            }
        }
        TransitionOutcome::Ignored { current } => {
            tracing::info!(partnership_id = %id, state = current.as_str(), "transition ignored");
        }
    }

    Ok(HandlerOutcome {
        partnership,
        outcome,
    })
}

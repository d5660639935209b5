//! Partnership service: the single entry point for executing commands.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use common::AggregateId;
use domain::{
    AggregateRoot, BrandId, Command, CreatePartnership, Partnership, PartnershipCommand,
    PartnershipEvent, PartnershipState, TransitionOutcome,
};
use messaging::{Broker, EventStatus, kinds};
use storage::PartnershipStore;

use crate::error::ApplicationError;
use crate::handlers::{self, HandlerOutcome};
use crate::outbox::{FlushReport, Outbox, PendingEvent};
use crate::unit_of_work::UnitOfWork;
use crate::Result;

/// What executing a command achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReceipt {
    pub partnership_id: AggregateId,
    pub command: &'static str,
    pub outcome: TransitionOutcome,
    pub state: PartnershipState,

    /// Events published by the commit's flush.
    pub published: usize,

    /// Events left queued because the broker refused them.
    pub deferred: usize,

    /// Publish failure reported by the flush. The state change is stored
    /// regardless.
    pub publish_error: Option<String>,
}

impl CommandReceipt {
    fn new(command: &'static str, handled: HandlerOutcome, report: FlushReport) -> Self {
        Self {
            partnership_id: handled.partnership.id(),
            command,
            outcome: handled.outcome,
            state: handled.partnership.state(),
            published: report.published,
            deferred: report.deferred,
            publish_error: report.error,
        }
    }
}

/// Executes partnership commands.
///
/// Every command runs in its own unit of work: handler, commit, then flush
/// of the outbox. A rejected creation is answered with a failure notice so
/// the saga that asked for it can compensate.
pub struct PartnershipService<S: PartnershipStore, B: Broker> {
    store: Arc<S>,
    outbox: Arc<Outbox<B>>,
    blocked_brands: HashSet<BrandId>,
}

impl<S: PartnershipStore, B: Broker> PartnershipService<S, B> {
    pub fn new(store: Arc<S>, outbox: Arc<Outbox<B>>) -> Self {
        Self {
            store,
            outbox,
            blocked_brands: HashSet::new(),
        }
    }

    /// Refuses creation for the given brands.
    pub fn with_blocked_brands(mut self, brands: impl IntoIterator<Item = BrandId>) -> Self {
        self.blocked_brands.extend(brands);
        self
    }

    pub fn outbox(&self) -> &Arc<Outbox<B>> {
        &self.outbox
    }

    /// Reads a partnership.
    pub async fn get(&self, id: AggregateId) -> Result<Option<Partnership>> {
        Ok(self.store.get(id).await?)
    }

    /// Executes a command.
    #[tracing::instrument(
        skip(self, command),
        fields(command = command.command_name(), partnership_id = %command.aggregate_id())
    )]
    pub async fn execute(&self, command: PartnershipCommand) -> Result<CommandReceipt> {
        let started = Instant::now();
        let name = command.command_name();

        let result = self.run(&command).await;

        let outcome = match &result {
            Ok(receipt) => receipt.outcome.as_str(),
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "failed",
        };
        metrics::counter!(
            "partnership_commands_total",
            "command" => name,
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("command_duration_seconds", "command" => name)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) if receipt.publish_error.is_some() => {
                tracing::warn!(
                    deferred = receipt.deferred,
                    error = receipt.publish_error.as_deref().unwrap_or_default(),
                    "command stored, events queued for retry"
                );
            }
            Ok(receipt) => {
                tracing::info!(outcome = receipt.outcome.as_str(), state = receipt.state.as_str(), "command executed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "command failed");
                // Storage failures are redelivered, so only final rejections
                // get a reply.
                if let PartnershipCommand::Create(cmd) = &command {
                    if e.is_rejection() && !matches!(e, ApplicationError::AlreadyExists(_)) {
                        self.announce_creation_failure(cmd, e).await;
                    }
                }
            }
        }

        result
    }

    async fn run(&self, command: &PartnershipCommand) -> Result<CommandReceipt> {
        let mut uow = UnitOfWork::begin(self.store.as_ref(), &self.outbox).await?;

        match handlers::dispatch(&mut uow, command, &self.blocked_brands).await {
            Ok(handled) => {
                let report = uow.commit().await?;
                Ok(CommandReceipt::new(command.command_name(), handled, report))
            }
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    tracing::error!(error = %rollback_error, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Publishes the failure reply for a rejected creation through a unit of
    /// work of its own, after the creation's work was rolled back.
    async fn announce_creation_failure(&self, cmd: &CreatePartnership, error: &ApplicationError) {
        let notice = PartnershipEvent::creation_failed(
            cmd.partnership_id,
            cmd.brand_id,
            cmd.partner_id,
            cmd.partnership_type.clone(),
            error.to_string(),
        );
        let pending = PendingEvent::new(notice, kinds::COMMAND_CREATE_PARTNER, EventStatus::Failed)
            .correlated(cmd.correlation_id);

        let result: Result<FlushReport> = async {
            let mut uow = UnitOfWork::begin(self.store.as_ref(), &self.outbox).await?;
            uow.register_event(pending);
            uow.commit().await
        }
        .await;

        match result {
            Ok(report) => tracing::info!(
                partnership_id = %cmd.partnership_id,
                published = report.published,
                "creation failure announced"
            ),
            Err(e) => tracing::error!(
                partnership_id = %cmd.partnership_id,
                error = %e,
                "failed to announce creation failure"
            ),
        }
    }
}

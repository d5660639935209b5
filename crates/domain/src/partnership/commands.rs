//! Partnership commands.

use chrono::{DateTime, Utc};
use common::{AggregateId, CorrelationId};

use crate::command::Command;

use super::{BrandId, PartnerId, Partnership};

/// Command to register a new partnership.
///
/// The type is carried as the raw requested string and validated by the
/// handler, so a rejection can report exactly what was asked for.
#[derive(Debug, Clone)]
pub struct CreatePartnership {
    /// The partnership ID to create.
    pub partnership_id: AggregateId,

    /// Saga correlation carried into the creation reply, if any.
    pub correlation_id: Option<CorrelationId>,

    pub brand_id: BrandId,
    pub partner_id: PartnerId,
    pub partnership_type: String,
    pub terms: String,
    pub commission_rate: f64,
    pub monthly_goal: u32,
    pub benefits: String,
    pub notes: String,
}

impl CreatePartnership {
    /// Creates a command with a generated partnership ID and empty terms.
    pub fn new(
        brand_id: BrandId,
        partner_id: PartnerId,
        partnership_type: impl Into<String>,
    ) -> Self {
        Self {
            partnership_id: AggregateId::new(),
            correlation_id: None,
            brand_id,
            partner_id,
            partnership_type: partnership_type.into(),
            terms: String::new(),
            commission_rate: 0.0,
            monthly_goal: 0,
            benefits: String::new(),
            notes: String::new(),
        }
    }

    /// Uses the given partnership ID instead of a generated one.
    pub fn with_id(mut self, partnership_id: AggregateId) -> Self {
        self.partnership_id = partnership_id;
        self
    }

    /// Attaches a saga correlation ID.
    pub fn correlated(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

impl Command for CreatePartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "CreatePartnership"
    }
}

/// Command to open negotiation on a partnership.
#[derive(Debug, Clone)]
pub struct StartNegotiation {
    pub partnership_id: AggregateId,
    pub terms: String,
}

impl StartNegotiation {
    pub fn new(partnership_id: AggregateId, terms: impl Into<String>) -> Self {
        Self {
            partnership_id,
            terms: terms.into(),
        }
    }
}

impl Command for StartNegotiation {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "StartNegotiation"
    }
}

/// Command to activate a negotiated partnership.
#[derive(Debug, Clone)]
pub struct ActivatePartnership {
    pub partnership_id: AggregateId,
    pub commission_rate: f64,
    pub monthly_goal: u32,
}

impl ActivatePartnership {
    pub fn new(partnership_id: AggregateId, commission_rate: f64, monthly_goal: u32) -> Self {
        Self {
            partnership_id,
            commission_rate,
            monthly_goal,
        }
    }
}

impl Command for ActivatePartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "ActivatePartnership"
    }
}

/// Command to bring a suspended partnership back to active.
#[derive(Debug, Clone)]
pub struct ReactivatePartnership {
    pub partnership_id: AggregateId,
}

impl ReactivatePartnership {
    pub fn new(partnership_id: AggregateId) -> Self {
        Self { partnership_id }
    }
}

impl Command for ReactivatePartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "ReactivatePartnership"
    }
}

/// Command to suspend an active partnership.
#[derive(Debug, Clone)]
pub struct SuspendPartnership {
    pub partnership_id: AggregateId,
    pub reason: String,
}

impl SuspendPartnership {
    pub fn new(partnership_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            partnership_id,
            reason: reason.into(),
        }
    }
}

impl Command for SuspendPartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "SuspendPartnership"
    }
}

/// Command to terminate a partnership.
#[derive(Debug, Clone)]
pub struct TerminatePartnership {
    pub partnership_id: AggregateId,
    pub reason: String,
}

impl TerminatePartnership {
    pub fn new(partnership_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            partnership_id,
            reason: reason.into(),
        }
    }
}

impl Command for TerminatePartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "TerminatePartnership"
    }
}

/// Command to renew an active partnership.
#[derive(Debug, Clone)]
pub struct RenewPartnership {
    pub partnership_id: AggregateId,
    pub new_end_date: DateTime<Utc>,
    pub new_terms: Option<String>,
}

impl RenewPartnership {
    pub fn new(
        partnership_id: AggregateId,
        new_end_date: DateTime<Utc>,
        new_terms: Option<String>,
    ) -> Self {
        Self {
            partnership_id,
            new_end_date,
            new_terms,
        }
    }
}

impl Command for RenewPartnership {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "RenewPartnership"
    }
}

/// Command to move an active partnership to another level.
///
/// The level is carried as the raw requested string.
#[derive(Debug, Clone)]
pub struct UpdateLevel {
    pub partnership_id: AggregateId,
    pub new_level: String,
}

impl UpdateLevel {
    pub fn new(partnership_id: AggregateId, new_level: impl Into<String>) -> Self {
        Self {
            partnership_id,
            new_level: new_level.into(),
        }
    }
}

impl Command for UpdateLevel {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn command_name(&self) -> &'static str {
        "UpdateLevel"
    }
}

/// Every command the partnership service accepts.
#[derive(Debug, Clone)]
pub enum PartnershipCommand {
    Create(CreatePartnership),
    StartNegotiation(StartNegotiation),
    Activate(ActivatePartnership),
    Reactivate(ReactivatePartnership),
    Suspend(SuspendPartnership),
    Terminate(TerminatePartnership),
    Renew(RenewPartnership),
    UpdateLevel(UpdateLevel),
}

impl PartnershipCommand {
    fn inner(&self) -> &dyn Command<Aggregate = Partnership> {
        match self {
            PartnershipCommand::Create(c) => c,
            PartnershipCommand::StartNegotiation(c) => c,
            PartnershipCommand::Activate(c) => c,
            PartnershipCommand::Reactivate(c) => c,
            PartnershipCommand::Suspend(c) => c,
            PartnershipCommand::Terminate(c) => c,
            PartnershipCommand::Renew(c) => c,
            PartnershipCommand::UpdateLevel(c) => c,
        }
    }
}

impl Command for PartnershipCommand {
    type Aggregate = Partnership;

    fn aggregate_id(&self) -> AggregateId {
        self.inner().aggregate_id()
    }

    fn command_name(&self) -> &'static str {
        self.inner().command_name()
    }
}

macro_rules! impl_from_command {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PartnershipCommand {
                fn from(command: $ty) -> Self {
                    PartnershipCommand::$variant(command)
                }
            }
        )*
    };
}

impl_from_command! {
    Create => CreatePartnership,
    StartNegotiation => StartNegotiation,
    Activate => ActivatePartnership,
    Reactivate => ReactivatePartnership,
    Suspend => SuspendPartnership,
    Terminate => TerminatePartnership,
    Renew => RenewPartnership,
    UpdateLevel => UpdateLevel,
}

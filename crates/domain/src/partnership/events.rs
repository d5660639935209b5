//! Partnership domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{BrandId, PartnerId, PartnershipLevel, PartnershipType};

/// A fact recorded by the partnership aggregate.
///
/// Every event names the partnership and both parties so downstream
/// consumers never need to look the aggregate up. The transition-specific
/// fields live in [`PartnershipChange`] and are flattened next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnershipEvent {
    pub event_id: EventId,
    pub partnership_id: AggregateId,
    pub brand_id: BrandId,
    pub partner_id: PartnerId,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub change: PartnershipChange,
}

/// What happened to the partnership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartnershipChange {
    /// The partnership was stored. Announced by the create handler, never
    /// recorded as a transition.
    #[serde(rename = "PartnershipCreated")]
    Created { partnership_type: PartnershipType },

    /// Creation was rejected; the requested type is kept verbatim because it
    /// may be the reason for the rejection.
    #[serde(rename = "PartnershipCreationFailed")]
    CreationFailed {
        requested_type: String,
        reason: String,
    },

    #[serde(rename = "PartnershipNegotiationStarted")]
    NegotiationStarted {
        partnership_type: PartnershipType,
        terms: String,
    },

    #[serde(rename = "PartnershipActivated")]
    Activated {
        commission_rate: f64,
        monthly_goal: u32,
    },

    #[serde(rename = "PartnershipReactivated")]
    Reactivated,

    #[serde(rename = "PartnershipSuspended")]
    Suspended { reason: String },

    #[serde(rename = "PartnershipTerminated")]
    Terminated { reason: String },

    #[serde(rename = "PartnershipRenewed")]
    Renewed {
        new_end_date: DateTime<Utc>,
        new_terms: Option<String>,
    },

    #[serde(rename = "LevelUpdated")]
    LevelUpdated {
        old_level: PartnershipLevel,
        new_level: PartnershipLevel,
    },
}

impl PartnershipChange {
    /// Returns the event type name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            PartnershipChange::Created { .. } => "PartnershipCreated",
            PartnershipChange::CreationFailed { .. } => "PartnershipCreationFailed",
            PartnershipChange::NegotiationStarted { .. } => "PartnershipNegotiationStarted",
            PartnershipChange::Activated { .. } => "PartnershipActivated",
            PartnershipChange::Reactivated => "PartnershipReactivated",
            PartnershipChange::Suspended { .. } => "PartnershipSuspended",
            PartnershipChange::Terminated { .. } => "PartnershipTerminated",
            PartnershipChange::Renewed { .. } => "PartnershipRenewed",
            PartnershipChange::LevelUpdated { .. } => "LevelUpdated",
        }
    }
}

impl DomainEvent for PartnershipEvent {
    fn event_type(&self) -> &'static str {
        self.change.name()
    }

    fn event_id(&self) -> EventId {
        self.event_id
    }

    fn aggregate_id(&self) -> AggregateId {
        self.partnership_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl PartnershipEvent {
    /// Creates an event for the given partnership, stamped now.
    pub(crate) fn new(
        partnership_id: AggregateId,
        brand_id: BrandId,
        partner_id: PartnerId,
        change: PartnershipChange,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            partnership_id,
            brand_id,
            partner_id,
            occurred_at: Utc::now(),
            change,
        }
    }

    /// Creates the notice announcing that a creation request was rejected.
    ///
    /// No aggregate exists at this point, so the identities come from the
    /// rejected request.
    pub fn creation_failed(
        partnership_id: AggregateId,
        brand_id: BrandId,
        partner_id: PartnerId,
        requested_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            partnership_id,
            brand_id,
            partner_id,
            PartnershipChange::CreationFailed {
                requested_type: requested_type.into(),
                reason: reason.into(),
            },
        )
    }
}

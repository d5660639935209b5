//! Mapping between the partnership aggregate and its stored row.
//!
//! This is the only module that knows the column layout.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BrandId, PartnerId, Partnership, PartnershipSnapshot};
use uuid::Uuid;

use crate::{Result, StorageError};

/// A partnership as stored, enumerations kept as their wire strings.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnershipRecord {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub partner_id: Uuid,
    pub partnership_type: String,
    pub state: String,
    pub level: String,
    pub terms: String,
    pub commission_rate: f64,
    pub monthly_goal: i64,
    pub benefits: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

impl PartnershipRecord {
    /// Captures the current state of an aggregate.
    pub fn from_partnership(partnership: &Partnership) -> Self {
        let s = partnership.snapshot();
        Self {
            id: s.id.as_uuid(),
            brand_id: s.brand_id.as_uuid(),
            partner_id: s.partner_id.as_uuid(),
            partnership_type: s.partnership_type.as_str().to_string(),
            state: s.state.as_str().to_string(),
            level: s.level.as_str().to_string(),
            terms: s.terms,
            commission_rate: s.commission_rate,
            monthly_goal: i64::from(s.monthly_goal),
            benefits: s.benefits,
            notes: s.notes,
            created_at: s.created_at,
            started_at: s.started_at,
            ended_at: s.ended_at,
            last_activity_at: s.last_activity_at,
        }
    }

    /// Returns the aggregate ID of this row.
    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.id)
    }

    /// Rebuilds the aggregate, failing on values the domain does not know.
    pub fn into_partnership(self) -> Result<Partnership> {
        let id = self.aggregate_id();
        let corrupt = |reason: String| StorageError::Corrupt { id, reason };

        let snapshot = PartnershipSnapshot {
            id,
            brand_id: BrandId::from_uuid(self.brand_id),
            partner_id: PartnerId::from_uuid(self.partner_id),
            partnership_type: self
                .partnership_type
                .parse()
                .map_err(|e| corrupt(format!("{e}")))?,
            state: self.state.parse().map_err(|e| corrupt(format!("{e}")))?,
            level: self.level.parse().map_err(|e| corrupt(format!("{e}")))?,
            terms: self.terms,
            commission_rate: self.commission_rate,
            monthly_goal: u32::try_from(self.monthly_goal)
                .map_err(|_| corrupt(format!("monthly goal out of range: {}", self.monthly_goal)))?,
            benefits: self.benefits,
            notes: self.notes,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            last_activity_at: self.last_activity_at,
        };

        Ok(Partnership::restore(snapshot))
    }
}

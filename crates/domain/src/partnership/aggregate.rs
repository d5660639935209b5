//! Partnership aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::aggregate::AggregateRoot;

use super::{
    BrandId, PartnerId, PartnershipChange, PartnershipError, PartnershipEvent, PartnershipLevel,
    PartnershipState, PartnershipType, TransitionOutcome,
};

/// Validated input for registering a new partnership.
#[derive(Debug, Clone)]
pub struct NewPartnership {
    pub id: AggregateId,
    pub brand_id: BrandId,
    pub partner_id: PartnerId,
    pub partnership_type: PartnershipType,
    pub terms: String,
    pub commission_rate: f64,
    pub monthly_goal: u32,
    pub benefits: String,
    pub notes: String,
}

/// Every persisted field of a partnership.
///
/// This is what storage reads and writes; it carries no behaviour and no
/// pending events.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnershipSnapshot {
    pub id: AggregateId,
    pub brand_id: BrandId,
    pub partner_id: PartnerId,
    pub partnership_type: PartnershipType,
    pub state: PartnershipState,
    pub level: PartnershipLevel,
    pub terms: String,
    pub commission_rate: f64,
    pub monthly_goal: u32,
    pub benefits: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

/// Partnership aggregate root.
///
/// Represents the relationship between a brand and a partner from its first
/// registration until it is terminated or renewed. Partnerships are never
/// deleted.
#[derive(Debug, Clone)]
pub struct Partnership {
    id: AggregateId,
    brand_id: BrandId,
    partner_id: PartnerId,
    partnership_type: PartnershipType,
    state: PartnershipState,
    level: PartnershipLevel,
    terms: String,
    commission_rate: f64,
    monthly_goal: u32,
    benefits: String,
    notes: String,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    last_activity_at: DateTime<Utc>,
    pending_events: Vec<PartnershipEvent>,
}

impl AggregateRoot for Partnership {
    type Event = PartnershipEvent;

    fn aggregate_type() -> &'static str {
        "Partnership"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn pending_events(&self) -> &[PartnershipEvent] {
        &self.pending_events
    }

    fn take_pending_events(&mut self) -> Vec<PartnershipEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// Query methods
impl Partnership {
    pub fn brand_id(&self) -> BrandId {
        self.brand_id
    }

    pub fn partner_id(&self) -> PartnerId {
        self.partner_id
    }

    pub fn partnership_type(&self) -> PartnershipType {
        self.partnership_type
    }

    pub fn state(&self) -> PartnershipState {
        self.state
    }

    pub fn level(&self) -> PartnershipLevel {
        self.level
    }

    pub fn terms(&self) -> &str {
        &self.terms
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn monthly_goal(&self) -> u32 {
        self.monthly_goal
    }

    pub fn benefits(&self) -> &str {
        &self.benefits
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the end date, set only by termination or renewal.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Returns true if the partnership is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns a copy of every persisted field.
    pub fn snapshot(&self) -> PartnershipSnapshot {
        PartnershipSnapshot {
            id: self.id,
            brand_id: self.brand_id,
            partner_id: self.partner_id,
            partnership_type: self.partnership_type,
            state: self.state,
            level: self.level,
            terms: self.terms.clone(),
            commission_rate: self.commission_rate,
            monthly_goal: self.monthly_goal,
            benefits: self.benefits.clone(),
            notes: self.notes.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

// Construction
impl Partnership {
    /// Registers a new partnership in the `Initiating` state at bronze level.
    ///
    /// Creation records no event; the handler announces it through
    /// [`Partnership::creation_notice`] once the partnership is stored.
    pub fn create(new: NewPartnership) -> Result<Self, PartnershipError> {
        validate_commission(new.commission_rate)?;

        let now = Utc::now();
        Ok(Self {
            id: new.id,
            brand_id: new.brand_id,
            partner_id: new.partner_id,
            partnership_type: new.partnership_type,
            state: PartnershipState::Initiating,
            level: PartnershipLevel::default(),
            terms: new.terms,
            commission_rate: new.commission_rate,
            monthly_goal: new.monthly_goal,
            benefits: new.benefits,
            notes: new.notes,
            created_at: now,
            started_at: now,
            ended_at: None,
            last_activity_at: now,
            pending_events: Vec::new(),
        })
    }

    /// Rebuilds a stored partnership. No events are recorded.
    pub fn restore(snapshot: PartnershipSnapshot) -> Self {
        Self {
            id: snapshot.id,
            brand_id: snapshot.brand_id,
            partner_id: snapshot.partner_id,
            partnership_type: snapshot.partnership_type,
            state: snapshot.state,
            level: snapshot.level,
            terms: snapshot.terms,
            commission_rate: snapshot.commission_rate,
            monthly_goal: snapshot.monthly_goal,
            benefits: snapshot.benefits,
            notes: snapshot.notes,
            created_at: snapshot.created_at,
            started_at: snapshot.started_at,
            ended_at: snapshot.ended_at,
            last_activity_at: snapshot.last_activity_at,
            pending_events: Vec::new(),
        }
    }

    /// Builds the notice announcing that this partnership now exists.
    pub fn creation_notice(&self) -> PartnershipEvent {
        self.new_event(PartnershipChange::Created {
            partnership_type: self.partnership_type,
        })
    }
}

// Transitions
impl Partnership {
    /// Opens negotiation under the given terms.
    pub fn start_negotiation(&mut self, terms: impl Into<String>) -> TransitionOutcome {
        if !self.state.can_start_negotiation() {
            return self.ignored();
        }

        let event = self.new_event(PartnershipChange::NegotiationStarted {
            partnership_type: self.partnership_type,
            terms: terms.into(),
        });
        self.record(event)
    }

    /// Activates a negotiated partnership with its commercial conditions.
    pub fn activate(
        &mut self,
        commission_rate: f64,
        monthly_goal: u32,
    ) -> Result<TransitionOutcome, PartnershipError> {
        validate_commission(commission_rate)?;

        if !self.state.can_activate() {
            return Ok(self.ignored());
        }

        let event = self.new_event(PartnershipChange::Activated {
            commission_rate,
            monthly_goal,
        });
        Ok(self.record(event))
    }

    /// Brings a suspended partnership back to active.
    pub fn reactivate(&mut self) -> TransitionOutcome {
        if !self.state.can_reactivate() {
            return self.ignored();
        }

        let event = self.new_event(PartnershipChange::Reactivated);
        self.record(event)
    }

    /// Puts an active partnership on hold.
    pub fn suspend(&mut self, reason: impl Into<String>) -> TransitionOutcome {
        if !self.state.can_suspend() {
            return self.ignored();
        }

        let event = self.new_event(PartnershipChange::Suspended {
            reason: reason.into(),
        });
        self.record(event)
    }

    /// Ends an active or suspended partnership now.
    pub fn terminate(&mut self, reason: impl Into<String>) -> TransitionOutcome {
        if !self.state.can_terminate() {
            return self.ignored();
        }

        let event = self.new_event(PartnershipChange::Terminated {
            reason: reason.into(),
        });
        self.record(event)
    }

    /// Renews an active partnership until `new_end_date`.
    ///
    /// Empty replacement terms keep the current ones.
    pub fn renew(
        &mut self,
        new_end_date: DateTime<Utc>,
        new_terms: Option<String>,
    ) -> Result<TransitionOutcome, PartnershipError> {
        if new_end_date <= Utc::now() {
            return Err(PartnershipError::RenewalDateInPast(new_end_date));
        }

        if !self.state.can_renew() {
            return Ok(self.ignored());
        }

        let event = self.new_event(PartnershipChange::Renewed {
            new_end_date,
            new_terms: new_terms.filter(|t| !t.is_empty()),
        });
        Ok(self.record(event))
    }

    /// Moves an active partnership to another level.
    ///
    /// Asking for the current level changes nothing.
    pub fn update_level(&mut self, new_level: PartnershipLevel) -> TransitionOutcome {
        if !self.state.can_update_level() || new_level == self.level {
            return self.ignored();
        }

        let event = self.new_event(PartnershipChange::LevelUpdated {
            old_level: self.level,
            new_level,
        });
        self.record(event)
    }
}

// Event helpers
impl Partnership {
    fn new_event(&self, change: PartnershipChange) -> PartnershipEvent {
        PartnershipEvent::new(self.id, self.brand_id, self.partner_id, change)
    }

    fn ignored(&self) -> TransitionOutcome {
        TransitionOutcome::Ignored {
            current: self.state,
        }
    }

    fn record(&mut self, event: PartnershipEvent) -> TransitionOutcome {
        self.apply(&event);
        self.pending_events.push(event);
        TransitionOutcome::Applied
    }

    fn apply(&mut self, event: &PartnershipEvent) {
        self.last_activity_at = event.occurred_at;

        match &event.change {
            PartnershipChange::NegotiationStarted { terms, .. } => {
                self.state = PartnershipState::Negotiating;
                self.terms = terms.clone();
            }
            PartnershipChange::Activated {
                commission_rate,
                monthly_goal,
            } => {
                self.state = PartnershipState::Active;
                self.commission_rate = *commission_rate;
                self.monthly_goal = *monthly_goal;
            }
            PartnershipChange::Reactivated => {
                self.state = PartnershipState::Active;
            }
            PartnershipChange::Suspended { .. } => {
                self.state = PartnershipState::Suspended;
            }
            PartnershipChange::Terminated { .. } => {
                self.state = PartnershipState::Terminated;
                self.ended_at = Some(event.occurred_at);
            }
            PartnershipChange::Renewed {
                new_end_date,
                new_terms,
            } => {
                self.state = PartnershipState::Renewed;
                self.ended_at = Some(*new_end_date);
                if let Some(terms) = new_terms {
                    self.terms = terms.clone();
                }
            }
            PartnershipChange::LevelUpdated { new_level, .. } => {
                self.level = *new_level;
            }
            PartnershipChange::Created { .. } | PartnershipChange::CreationFailed { .. } => {
                // Notices, not transitions
            }
        }
    }
}

fn validate_commission(rate: f64) -> Result<(), PartnershipError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(PartnershipError::InvalidCommissionRate(rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;
    use chrono::Duration;

    fn new_partnership() -> Partnership {
        Partnership::create(NewPartnership {
            id: AggregateId::new(),
            brand_id: BrandId::new(),
            partner_id: PartnerId::new(),
            partnership_type: PartnershipType::BrandAmbassador,
            terms: String::new(),
            commission_rate: 0.0,
            monthly_goal: 0,
            benefits: String::new(),
            notes: String::new(),
        })
        .unwrap()
    }

    fn active_partnership() -> Partnership {
        let mut p = new_partnership();
        let _ = p.start_negotiation("30 days");
        let _ = p.activate(5.0, 100).unwrap();
        p.take_pending_events();
        p
    }

    #[test]
    fn test_create_starts_initiating_at_bronze() {
        let p = new_partnership();
        assert_eq!(p.state(), PartnershipState::Initiating);
        assert_eq!(p.level(), PartnershipLevel::Bronze);
        assert!(p.ended_at().is_none());
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_create_rejects_negative_commission() {
        let result = Partnership::create(NewPartnership {
            commission_rate: -1.0,
            ..new_partnership_input()
        });
        assert!(matches!(
            result,
            Err(PartnershipError::InvalidCommissionRate(_))
        ));
    }

    fn new_partnership_input() -> NewPartnership {
        NewPartnership {
            id: AggregateId::new(),
            brand_id: BrandId::new(),
            partner_id: PartnerId::new(),
            partnership_type: PartnershipType::BrandAffiliate,
            terms: String::new(),
            commission_rate: 0.0,
            monthly_goal: 0,
            benefits: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_start_negotiation_sets_terms_and_records_event() {
        let mut p = new_partnership();
        let before = p.last_activity_at();

        let outcome = p.start_negotiation("30 days");

        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(p.state(), PartnershipState::Negotiating);
        assert_eq!(p.terms(), "30 days");
        assert!(p.last_activity_at() >= before);
        assert_eq!(p.pending_events().len(), 1);
        assert_eq!(
            p.pending_events()[0].event_type(),
            "PartnershipNegotiationStarted"
        );
    }

    #[test]
    fn test_activate_from_negotiating() {
        let mut p = new_partnership();
        let _ = p.start_negotiation("terms");
        p.take_pending_events();

        let outcome = p.activate(5.0, 100).unwrap();

        assert!(outcome.is_applied());
        assert_eq!(p.state(), PartnershipState::Active);
        assert_eq!(p.commission_rate(), 5.0);
        assert_eq!(p.monthly_goal(), 100);
        assert_eq!(p.pending_events()[0].event_type(), "PartnershipActivated");
    }

    #[test]
    fn test_activate_from_initiating_is_ignored() {
        let mut p = new_partnership();

        let outcome = p.activate(5.0, 100).unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Ignored {
                current: PartnershipState::Initiating
            }
        );
        assert_eq!(p.commission_rate(), 0.0);
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_activate_rejects_nan_commission_even_when_ignorable() {
        let mut p = active_partnership();
        assert!(matches!(
            p.activate(f64::NAN, 1),
            Err(PartnershipError::InvalidCommissionRate(_))
        ));
    }

    #[test]
    fn test_suspend_while_negotiating_is_noop() {
        let mut p = new_partnership();
        let _ = p.start_negotiation("terms");
        p.take_pending_events();
        let last_activity = p.last_activity_at();

        let outcome = p.suspend("late payments");

        assert!(!outcome.is_applied());
        assert_eq!(p.state(), PartnershipState::Negotiating);
        assert_eq!(p.last_activity_at(), last_activity);
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_suspend_and_reactivate() {
        let mut p = active_partnership();

        assert!(p.suspend("audit").is_applied());
        assert_eq!(p.state(), PartnershipState::Suspended);

        assert!(p.reactivate().is_applied());
        assert_eq!(p.state(), PartnershipState::Active);

        let types: Vec<_> = p.pending_events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["PartnershipSuspended", "PartnershipReactivated"]);
    }

    #[test]
    fn test_reactivate_only_from_suspended() {
        let mut p = active_partnership();
        assert!(!p.reactivate().is_applied());
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_terminate_sets_end_date() {
        let mut p = active_partnership();

        let outcome = p.terminate("contract ended");

        assert!(outcome.is_applied());
        assert_eq!(p.state(), PartnershipState::Terminated);
        let event = &p.pending_events()[0];
        assert_eq!(p.ended_at(), Some(event.occurred_at));
        assert!(p.is_terminal());
    }

    #[test]
    fn test_terminate_from_suspended() {
        let mut p = active_partnership();
        let _ = p.suspend("audit");

        assert!(p.terminate("fraud").is_applied());
        assert_eq!(p.state(), PartnershipState::Terminated);
    }

    #[test]
    fn test_terminated_partnership_ignores_everything() {
        let mut p = active_partnership();
        let _ = p.terminate("done");
        p.take_pending_events();

        assert!(!p.terminate("again").is_applied());
        assert!(!p.suspend("x").is_applied());
        assert!(!p.reactivate().is_applied());
        assert!(!p.update_level(PartnershipLevel::Gold).is_applied());
        assert!(!p.start_negotiation("x").is_applied());
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_renew_sets_end_date_and_optionally_terms() {
        let mut p = active_partnership();
        let end = Utc::now() + Duration::days(365);

        let outcome = p.renew(end, Some("new terms".to_string())).unwrap();

        assert!(outcome.is_applied());
        assert_eq!(p.state(), PartnershipState::Renewed);
        assert_eq!(p.ended_at(), Some(end));
        assert_eq!(p.terms(), "new terms");
    }

    #[test]
    fn test_renew_keeps_terms_when_none_given() {
        let mut p = active_partnership();
        let end = Utc::now() + Duration::days(30);

        let _ = p.renew(end, Some(String::new())).unwrap();

        assert_eq!(p.terms(), "30 days");
    }

    #[test]
    fn test_renew_rejects_past_end_date() {
        let mut p = active_partnership();
        let result = p.renew(Utc::now() - Duration::days(1), None);
        assert!(matches!(result, Err(PartnershipError::RenewalDateInPast(_))));
        assert_eq!(p.state(), PartnershipState::Active);
    }

    #[test]
    fn test_update_level_records_old_and_new() {
        let mut p = active_partnership();

        assert!(p.update_level(PartnershipLevel::Gold).is_applied());
        assert_eq!(p.level(), PartnershipLevel::Gold);

        match &p.pending_events()[0].change {
            PartnershipChange::LevelUpdated {
                old_level,
                new_level,
            } => {
                assert_eq!(*old_level, PartnershipLevel::Bronze);
                assert_eq!(*new_level, PartnershipLevel::Gold);
            }
            other => panic!("Expected LevelUpdated, got {other:?}"),
        }
    }

    #[test]
    fn test_update_level_to_same_level_is_ignored() {
        let mut p = active_partnership();
        assert!(!p.update_level(PartnershipLevel::Bronze).is_applied());
        assert!(!p.has_pending_events());
    }

    #[test]
    fn test_update_level_requires_active() {
        let mut p = new_partnership();
        assert!(!p.update_level(PartnershipLevel::Gold).is_applied());
        assert_eq!(p.level(), PartnershipLevel::Bronze);
    }

    #[test]
    fn test_events_carry_identities() {
        let mut p = new_partnership();
        let _ = p.start_negotiation("t");

        let event = &p.pending_events()[0];
        assert_eq!(event.partnership_id, p.id());
        assert_eq!(event.brand_id, p.brand_id());
        assert_eq!(event.partner_id, p.partner_id());
    }

    #[test]
    fn test_snapshot_restore_round_trip_drops_pending_events() {
        let mut p = active_partnership();
        let _ = p.update_level(PartnershipLevel::Silver);

        let restored = Partnership::restore(p.snapshot());

        assert_eq!(restored.snapshot(), p.snapshot());
        assert!(!restored.has_pending_events());
    }

    #[test]
    fn test_creation_notice_is_not_recorded() {
        let p = new_partnership();
        let notice = p.creation_notice();

        assert_eq!(notice.event_type(), "PartnershipCreated");
        assert_eq!(notice.partnership_id, p.id());
        assert!(!p.has_pending_events());
    }
}

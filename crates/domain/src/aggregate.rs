//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is the name consumers see, and the default routing key.
    fn event_type(&self) -> &'static str;

    /// Returns the unique identity of this event.
    fn event_id(&self) -> EventId;

    /// Returns the aggregate the event belongs to.
    fn aggregate_id(&self) -> AggregateId;

    /// Returns when the event happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Trait for state-stored aggregates that record the events they produce.
///
/// Transition methods mutate the aggregate and append to its pending-event
/// list. Whoever persists the aggregate drains that list afterwards and hands
/// the events to the outbox, so an event is never published for a state that
/// was not stored.
pub trait AggregateRoot: Send + Sync {
    /// The type of events this aggregate records.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the events recorded since the last drain, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Removes and returns the recorded events, oldest first.
    fn take_pending_events(&mut self) -> Vec<Self::Event>;

    /// Returns true if transitions were recorded since the last drain.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}

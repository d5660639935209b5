//! Identifier types shared by every crate of the partner lifecycle service.

mod types;

pub use types::{AggregateId, CorrelationId, EventId};

//! Domain layer for the partnership lifecycle service.
//!
//! This crate provides the core domain abstractions including:
//! - AggregateRoot trait for state-stored aggregates that record events
//! - DomainEvent trait for domain events
//! - Command trait and the partnership command set
//! - Partnership aggregate implementation with state machine

pub mod aggregate;
pub mod command;
pub mod partnership;

pub use aggregate::{AggregateRoot, DomainEvent};
pub use command::Command;
pub use partnership::{
    ActivatePartnership, BrandId, CreatePartnership, NewPartnership, PartnerId, Partnership,
    PartnershipChange, PartnershipCommand, PartnershipError, PartnershipEvent, PartnershipLevel,
    PartnershipSnapshot, PartnershipState, PartnershipType, ReactivatePartnership,
    RenewPartnership, StartNegotiation, SuspendPartnership, TerminatePartnership,
    TransitionOutcome, UpdateLevel,
};

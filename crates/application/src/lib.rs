//! Application layer for the partnership service.
//!
//! This crate provides:
//! - Outbox holding events until their storage change is committed
//! - UnitOfWork batching storage operations and events per command
//! - Command handlers, one per partnership command
//! - PartnershipService, the single entry point executing commands
//! - EventProcessingService re-entering the service from inbound saga events

pub mod error;
pub mod event_processing;
pub mod handlers;
pub mod outbox;
pub mod service;
pub mod unit_of_work;

pub use error::{ApplicationError, Result};
pub use event_processing::{EventProcessingService, LifecycleEventLogger, saga_consumer};
pub use handlers::HandlerOutcome;
pub use outbox::{FlushReport, Outbox, PendingEvent};
pub use service::{CommandReceipt, PartnershipService};
pub use unit_of_work::{Savepoint, UnitOfWork};

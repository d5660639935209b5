//! Messaging layer for the partnership service.
//!
//! This crate provides:
//! - RoutingTable mapping (event kind, status) pairs onto broker topics
//! - EventEnvelope, the JSON document exchanged with other services
//! - Broker, Producer and Consumer traits describing the broker contract,
//!   with an in-memory implementation
//! - EventPublisher for outbound events
//! - EventConsumer workers dispatching inbound envelopes to handlers

pub mod broker;
pub mod config;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod routing;

pub use broker::{Broker, Consumer, Message, MessageId, Producer};
pub use config::MessagingConfig;
pub use consumer::{ConsumerHandle, EventConsumer, EventHandler};
pub use envelope::{EventEnvelope, EventStatus, kinds, topics};
pub use error::{BrokerError, HandlerError, PublishError};
pub use memory::InMemoryBroker;
pub use publisher::EventPublisher;
pub use routing::RoutingTable;

//! The broker contract: topics, shared subscriptions, ack and nack.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BrokerError;

/// Broker-assigned identity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a subscription.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub publish_time: DateTime<Utc>,

    /// How many times this message was handed out before.
    pub redelivery_count: u32,
}

/// A connection to a message broker.
///
/// Subscriptions are shared: consumers attached to the same subscription
/// name compete for messages, and every subscription sees every message
/// published after it was created. Delivery is at-least-once.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    type Producer: Producer;
    type Consumer: Consumer;

    /// Creates a producer bound to a topic.
    async fn create_producer(&self, topic: &str) -> Result<Self::Producer, BrokerError>;

    /// Attaches a consumer to a shared subscription on a topic.
    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<Self::Consumer, BrokerError>;

    /// Closes the connection. Producers and consumers stop working.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Sends messages to one topic.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    async fn send(&self, payload: Vec<u8>) -> Result<MessageId, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// Receives messages from one subscription.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// Waits up to `timeout` for the next message.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing to deliver.
    async fn receive(&self, timeout: Duration) -> Result<Option<Message>, BrokerError>;

    /// Marks a message as processed.
    async fn acknowledge(&self, message: &Message) -> Result<(), BrokerError>;

    /// Returns a message for later redelivery.
    async fn negative_acknowledge(&self, message: &Message) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

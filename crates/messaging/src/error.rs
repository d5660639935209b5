use thiserror::Error;

/// Errors reported by a broker connection.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be sent.
    #[error("Send failed for topic '{topic}': {reason}")]
    SendFailed { topic: String, reason: String },

    /// A subscription could not be created.
    #[error("Subscription '{subscription}' failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        topic: String,
        subscription: String,
        reason: String,
    },

    /// The producer, consumer or broker was already closed.
    #[error("Closed: {0}")]
    Closed(String),
}

/// Errors raised while publishing a domain event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be serialized into an envelope.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker refused the message.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Outcome of a handler that could not process an inbound envelope.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Processing failed for a reason that may go away; the message is
    /// negatively acknowledged and redelivered.
    #[error("Retryable: {0}")]
    Retryable(String),

    /// The message can never be processed; it is acknowledged and dropped.
    #[error("Rejected: {0}")]
    Rejected(String),
}

//! Inbound consumption: one worker per subscribed topic key.
//!
//! Each worker loops on `receive(timeout)`. A timeout is not an error; the
//! stop signal is checked between receives, so a worker exits within one
//! receive timeout after [`ConsumerHandle::stop`].
//!
//! Acknowledgement rules:
//! - handler succeeded, rejected the message, or no handler matches: ack
//! - envelope does not decode, or handler asked for a retry: nack

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broker::{Broker, Consumer, Message};
use crate::envelope::{EventEnvelope, EventStatus};
use crate::error::HandlerError;
use crate::routing::RoutingTable;

/// Processes inbound envelopes of the kinds it is registered for.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HandlerKey {
    Kind(String),
    KindAndStatus(String, EventStatus),
}

type Handlers = HashMap<HandlerKey, Arc<dyn EventHandler>>;

/// Subscribes to topic keys and dispatches envelopes to handlers.
///
/// A handler registered for `(kind, status)` wins over one registered for
/// the kind alone.
pub struct EventConsumer<B: Broker> {
    broker: Arc<B>,
    routing: RoutingTable,
    topic_keys: Vec<String>,
    receive_timeout: Duration,
    handlers: Handlers,
}

impl<B: Broker> EventConsumer<B> {
    pub fn new(
        broker: Arc<B>,
        routing: RoutingTable,
        topic_keys: Vec<String>,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            broker,
            routing,
            topic_keys,
            receive_timeout,
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for every status of `kind`.
    pub fn on(mut self, kind: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(HandlerKey::Kind(kind.into()), handler);
        self
    }

    /// Registers a handler for `kind` with exactly `status`.
    pub fn on_status(
        mut self,
        kind: impl Into<String>,
        status: EventStatus,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.handlers
            .insert(HandlerKey::KindAndStatus(kind.into(), status), handler);
        self
    }

    /// Subscribes every topic key and spawns its worker.
    ///
    /// A key whose subscription fails is logged and skipped; the others
    /// keep running.
    pub async fn start(self) -> ConsumerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handlers = Arc::new(self.handlers);
        let mut workers = Vec::with_capacity(self.topic_keys.len());

        for key in &self.topic_keys {
            let topic = self.routing.topic_name(key);
            let subscription = RoutingTable::subscription_name(key);

            let consumer = match self.broker.subscribe(&topic, &subscription).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::error!(%topic, %subscription, error = %e, "failed to subscribe");
                    continue;
                }
            };
            tracing::info!(%topic, %subscription, "consumer started");

            let worker = Worker {
                topic,
                consumer,
                handlers: handlers.clone(),
                receive_timeout: self.receive_timeout,
                stop: stop_rx.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        ConsumerHandle { stop_tx, workers }
    }
}

/// Running consumer workers.
pub struct ConsumerHandle {
    stop_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Returns the number of workers that started.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signals every worker to stop and waits for them to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        for result in futures_util::future::join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "consumer worker panicked");
            }
        }
        tracing::info!("consumers stopped");
    }
}

struct Worker<C: Consumer> {
    topic: String,
    consumer: C,
    handlers: Arc<Handlers>,
    receive_timeout: Duration,
    stop: watch::Receiver<bool>,
}

enum Disposition {
    Ack(&'static str),
    Nack(&'static str),
}

impl<C: Consumer> Worker<C> {
    #[tracing::instrument(skip(self), fields(topic = %self.topic))]
    async fn run(self) {
        while !*self.stop.borrow() {
            let message = match self.consumer.receive(self.receive_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "receive failed, stopping worker");
                    break;
                }
            };

            self.process(message).await;
        }

        if let Err(e) = self.consumer.close().await {
            tracing::warn!(error = %e, "failed to close consumer");
        }
    }

    async fn process(&self, message: Message) {
        let disposition = self.dispatch(&message).await;

        let (result, label) = match disposition {
            Disposition::Ack(label) => (self.consumer.acknowledge(&message).await, label),
            Disposition::Nack(label) => (self.consumer.negative_acknowledge(&message).await, label),
        };

        metrics::counter!(
            "consumer_messages_total",
            "topic" => self.topic.clone(),
            "result" => label
        )
        .increment(1);

        if let Err(e) = result {
            tracing::warn!(message_id = %message.id, error = %e, "failed to settle message");
        }
    }

    async fn dispatch(&self, message: &Message) -> Disposition {
        let envelope = match EventEnvelope::from_bytes(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(message_id = %message.id, error = %e, "undecodable message");
                return Disposition::Nack("malformed");
            }
        };

        tracing::info!(
            event_type = %envelope.event_type,
            status = %envelope.status,
            correlation_id = ?envelope.correlation_id,
            "processing event"
        );

        let Some(handler) = self.handler_for(&envelope) else {
            tracing::info!(event_type = %envelope.event_type, "event ignored");
            return Disposition::Ack("ignored");
        };

        match handler.handle(&envelope).await {
            Ok(()) => Disposition::Ack("handled"),
            Err(HandlerError::Rejected(reason)) => {
                tracing::warn!(event_type = %envelope.event_type, %reason, "event rejected");
                Disposition::Ack("rejected")
            }
            Err(HandlerError::Retryable(reason)) => {
                tracing::error!(event_type = %envelope.event_type, %reason, "event processing failed");
                Disposition::Nack("retry")
            }
        }
    }

    fn handler_for(&self, envelope: &EventEnvelope) -> Option<&Arc<dyn EventHandler>> {
        self.handlers
            .get(&HandlerKey::KindAndStatus(
                envelope.event_type.clone(),
                envelope.status.clone(),
            ))
            .or_else(|| {
                self.handlers
                    .get(&HandlerKey::Kind(envelope.event_type.clone()))
            })
    }
}

//! Outbound event publication.

use std::collections::HashMap;
use std::sync::Arc;

use common::CorrelationId;
use domain::DomainEvent;
use tokio::sync::Mutex;

use crate::broker::{Broker, MessageId, Producer};
use crate::envelope::{EventEnvelope, EventStatus};
use crate::error::{BrokerError, PublishError};
use crate::routing::RoutingTable;

/// Publishes domain events as envelopes on their routed topics.
///
/// Producers are created lazily, one per topic, and reused until a send
/// through them fails.
pub struct EventPublisher<B: Broker> {
    broker: Arc<B>,
    routing: RoutingTable,
    service_name: String,
    producers: Mutex<HashMap<String, Arc<B::Producer>>>,
}

impl<B: Broker> EventPublisher<B> {
    /// Creates a publisher sending through `broker`.
    pub fn new(broker: Arc<B>, routing: RoutingTable, service_name: impl Into<String>) -> Self {
        Self {
            broker,
            routing,
            service_name: service_name.into(),
            producers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the routing table in use.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Publishes `event` under the given kind and status.
    ///
    /// A fresh correlation ID is stamped when none is given. Failures are
    /// logged and returned; nothing is retried here.
    #[tracing::instrument(
        skip(self, event),
        fields(event_id = %event.event_id(), aggregate_id = %event.aggregate_id())
    )]
    pub async fn publish<E: DomainEvent>(
        &self,
        event: &E,
        kind: &str,
        status: &EventStatus,
        correlation_id: Option<CorrelationId>,
    ) -> Result<MessageId, PublishError> {
        let topic = self.routing.route(kind, status);

        let result = self
            .send(&topic, event, kind, status, correlation_id)
            .await;

        match &result {
            Ok(message_id) => {
                metrics::counter!("events_published_total", "kind" => kind.to_string())
                    .increment(1);
                tracing::info!(%topic, %message_id, event_type = event.event_type(), "event published");
            }
            Err(e) => {
                metrics::counter!("events_publish_failures_total", "kind" => kind.to_string())
                    .increment(1);
                tracing::error!(%topic, error = %e, "failed to publish event");
            }
        }

        result
    }

    async fn send<E: DomainEvent>(
        &self,
        topic: &str,
        event: &E,
        kind: &str,
        status: &EventStatus,
        correlation_id: Option<CorrelationId>,
    ) -> Result<MessageId, PublishError> {
        let envelope = EventEnvelope {
            correlation_id: Some(correlation_id.unwrap_or_default()),
            service: self.service_name.clone(),
            status: status.clone(),
            event_id: event.event_id(),
            event_type: kind.to_string(),
            event_data: serde_json::to_value(event)?,
            timestamp: Some(event.occurred_at()),
        };
        let payload = envelope.to_bytes()?;

        let producer = self.producer(topic).await?;
        match producer.send(payload).await {
            Ok(message_id) => Ok(message_id),
            Err(e) => {
                if matches!(e, BrokerError::Closed(_) | BrokerError::SendFailed { .. }) {
                    self.evict(topic, &producer).await;
                }
                Err(e.into())
            }
        }
    }

    async fn producer(&self, topic: &str) -> Result<Arc<B::Producer>, BrokerError> {
        let mut producers = self.producers.lock().await;
        if let Some(producer) = producers.get(topic) {
            return Ok(producer.clone());
        }

        let producer = Arc::new(self.broker.create_producer(topic).await?);
        producers.insert(topic.to_string(), producer.clone());
        Ok(producer)
    }

    /// Drops a failed producer so the next publish on `topic` creates a new
    /// one.
    async fn evict(&self, topic: &str, failed: &Arc<B::Producer>) {
        let removed = {
            let mut producers = self.producers.lock().await;
            match producers.get(topic) {
                Some(cached) if Arc::ptr_eq(cached, failed) => producers.remove(topic),
                _ => None,
            }
        };

        if let Some(producer) = removed {
            tracing::debug!(%topic, "evicting failed producer");
            if let Err(e) = producer.close().await {
                tracing::debug!(%topic, error = %e, "failed to close evicted producer");
            }
        }
    }

    /// Closes every cached producer.
    pub async fn close(&self) {
        let producers: Vec<_> = self.producers.lock().await.drain().collect();
        for (topic, producer) in producers {
            if let Err(e) = producer.close().await {
                tracing::warn!(%topic, error = %e, "failed to close producer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::kinds;
    use crate::memory::InMemoryBroker;
    use common::AggregateId;
    use domain::{BrandId, PartnerId, PartnershipEvent};

    fn failed_notice() -> PartnershipEvent {
        PartnershipEvent::creation_failed(
            AggregateId::new(),
            BrandId::new(),
            PartnerId::new(),
            "marca_afiliado",
            "blocked brand",
        )
    }

    fn publisher(broker: &InMemoryBroker) -> EventPublisher<InMemoryBroker> {
        EventPublisher::new(
            Arc::new(broker.clone()),
            RoutingTable::default(),
            "Partner",
        )
    }

    #[tokio::test]
    async fn test_publish_routes_and_wraps_event() {
        let broker = InMemoryBroker::new();
        let publisher = publisher(&broker);
        let event = failed_notice();
        let saga = CorrelationId::new();

        publisher
            .publish(
                &event,
                kinds::COMMAND_CREATE_PARTNER,
                &EventStatus::Failed,
                Some(saga),
            )
            .await
            .unwrap();

        let envelopes = broker
            .published_envelopes("persistent://content-management/events/content-events")
            .await;
        assert_eq!(envelopes.len(), 1);

        let envelope = &envelopes[0];
        assert_eq!(envelope.correlation_id, Some(saga));
        assert_eq!(envelope.service, "Partner");
        assert_eq!(envelope.status, EventStatus::Failed);
        assert_eq!(envelope.event_id, event.event_id);
        assert_eq!(envelope.event_type, kinds::COMMAND_CREATE_PARTNER);
        assert_eq!(envelope.event_data["type"], "PartnershipCreationFailed");
        assert_eq!(envelope.event_data["reason"], "blocked brand");
        assert_eq!(envelope.timestamp, Some(event.occurred_at));
    }

    #[tokio::test]
    async fn test_publish_without_correlation_stamps_one() {
        let broker = InMemoryBroker::new();
        let publisher = publisher(&broker);

        publisher
            .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
            .await
            .unwrap();

        let envelopes = broker
            .published_envelopes("persistent://partner-lifecycle/events/LevelUpdated")
            .await;
        assert!(envelopes[0].correlation_id.is_some());
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let broker = InMemoryBroker::new();
        let publisher = publisher(&broker);
        broker.fail_publishes(true);

        let result = publisher
            .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
            .await;

        assert!(matches!(result, Err(PublishError::Broker(_))));
    }

    #[tokio::test]
    async fn test_producer_is_reused_per_topic() {
        let broker = InMemoryBroker::new();
        let publisher = publisher(&broker);

        for _ in 0..3 {
            publisher
                .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
                .await
                .unwrap();
        }

        assert_eq!(publisher.producers.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_producer_is_replaced_on_next_publish() {
        let broker = InMemoryBroker::new();
        let publisher = publisher(&broker);
        let topic = "persistent://partner-lifecycle/events/LevelUpdated";

        publisher
            .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
            .await
            .unwrap();
        let cached = publisher.producers.lock().await.get(topic).cloned().unwrap();
        cached.close().await.unwrap();

        let failed = publisher
            .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
            .await;
        assert!(matches!(
            failed,
            Err(PublishError::Broker(BrokerError::Closed(_)))
        ));
        assert!(publisher.producers.lock().await.is_empty());

        publisher
            .publish(&failed_notice(), "LevelUpdated", &EventStatus::Success, None)
            .await
            .unwrap();
        assert_eq!(broker.published(topic).await.len(), 2);
    }
}

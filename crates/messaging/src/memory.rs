use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;

use crate::broker::{Broker, Consumer, Message, MessageId, Producer};
use crate::envelope::EventEnvelope;
use crate::error::BrokerError;

const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(50);
const DEFAULT_LOG_CAPACITY: usize = 1024;

/// In-memory broker for tests and for running without a broker.
///
/// Implements shared subscriptions, ack/nack with delayed redelivery and a
/// per-topic log of the most recently published messages. Publishing can be
/// made to fail to exercise outbox retries.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    topics: RwLock<HashMap<String, Topic>>,
    next_id: AtomicU64,
    failing_publishes: AtomicBool,
    closed: AtomicBool,
    redelivery_delay: Duration,
    log_capacity: usize,
}

#[derive(Default)]
struct Topic {
    log: VecDeque<Message>,
    subscriptions: HashMap<String, Arc<Subscription>>,
}

#[derive(Default)]
struct Subscription {
    backlog: Mutex<VecDeque<Message>>,
    unacked: Mutex<HashMap<MessageId, Message>>,
    ready: Notify,
}

impl Subscription {
    async fn push(&self, message: Message) {
        self.backlog.lock().await.push_back(message);
        self.ready.notify_one();
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::build(DEFAULT_REDELIVERY_DELAY, DEFAULT_LOG_CAPACITY)
    }
}

impl InMemoryBroker {
    /// Creates a new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that redelivers nacked messages after `delay`.
    pub fn with_redelivery_delay(delay: Duration) -> Self {
        Self::build(delay, DEFAULT_LOG_CAPACITY)
    }

    /// Creates a broker that keeps at most `capacity` messages per topic for
    /// [`InMemoryBroker::published`]. Zero disables the log.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self::build(DEFAULT_REDELIVERY_DELAY, capacity)
    }

    fn build(redelivery_delay: Duration, log_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                failing_publishes: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                redelivery_delay,
                log_capacity,
            }),
        }
    }

    /// Makes every send fail until switched off again.
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.failing_publishes.store(fail, Ordering::SeqCst);
    }

    /// Returns the retained messages published on `topic`, oldest first.
    pub async fn published(&self, topic: &str) -> Vec<Message> {
        self.inner
            .topics
            .read()
            .await
            .get(topic)
            .map(|t| t.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the envelopes published on `topic` that decode, oldest first.
    pub async fn published_envelopes(&self, topic: &str) -> Vec<EventEnvelope> {
        self.published(topic)
            .await
            .iter()
            .filter_map(|m| EventEnvelope::from_bytes(&m.payload).ok())
            .collect()
    }

    /// Returns the number of messages a subscription has not acknowledged
    /// yet, queued or in flight.
    pub async fn unacknowledged(&self, topic: &str, subscription: &str) -> usize {
        let sub = {
            let topics = self.inner.topics.read().await;
            match topics.get(topic).and_then(|t| t.subscriptions.get(subscription)) {
                Some(sub) => sub.clone(),
                None => return 0,
            }
        };
        let queued = sub.backlog.lock().await.len();
        let in_flight = sub.unacked.lock().await.len();
        queued + in_flight
    }

    /// Publishes raw bytes on a topic, as another service would.
    pub async fn inject(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, BrokerError> {
        self.inner.publish(topic, payload).await
    }
}

impl Inner {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed("broker".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, BrokerError> {
        self.ensure_open()?;
        if self.failing_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::SendFailed {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let message = Message {
            id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            topic: topic.to_string(),
            payload,
            publish_time: Utc::now(),
            redelivery_count: 0,
        };

        let subscriptions: Vec<Arc<Subscription>> = {
            let mut topics = self.topics.write().await;
            let entry = topics.entry(topic.to_string()).or_default();
            if self.log_capacity > 0 {
                if entry.log.len() == self.log_capacity {
                    entry.log.pop_front();
                }
                entry.log.push_back(message.clone());
            }
            entry.subscriptions.values().cloned().collect()
        };

        for sub in subscriptions {
            sub.push(message.clone()).await;
        }

        Ok(message.id)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    type Producer = InMemoryProducer;
    type Consumer = InMemoryConsumer;

    async fn create_producer(&self, topic: &str) -> Result<InMemoryProducer, BrokerError> {
        self.inner.ensure_open()?;
        Ok(InMemoryProducer {
            inner: self.inner.clone(),
            topic: topic.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<InMemoryConsumer, BrokerError> {
        self.inner.ensure_open()?;
        let sub = self
            .inner
            .topics
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .subscriptions
            .entry(subscription.to_string())
            .or_default()
            .clone();

        Ok(InMemoryConsumer {
            inner: self.inner.clone(),
            subscription: sub,
            name: format!("{topic}/{subscription}"),
            closed: AtomicBool::new(false),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Producer handed out by [`InMemoryBroker`].
pub struct InMemoryProducer {
    inner: Arc<Inner>,
    topic: String,
    closed: AtomicBool,
}

#[async_trait]
impl Producer for InMemoryProducer {
    async fn send(&self, payload: Vec<u8>) -> Result<MessageId, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed(format!("producer {}", self.topic)));
        }
        self.inner.publish(&self.topic, payload).await
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Consumer handed out by [`InMemoryBroker`].
pub struct InMemoryConsumer {
    inner: Arc<Inner>,
    subscription: Arc<Subscription>,
    name: String,
    closed: AtomicBool,
}

impl InMemoryConsumer {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed(format!("consumer {}", self.name)));
        }
        self.inner.ensure_open()
    }
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn receive(&self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.ensure_open()?;

            let next = self.subscription.backlog.lock().await.pop_front();
            if let Some(message) = next {
                self.subscription
                    .unacked
                    .lock()
                    .await
                    .insert(message.id, message.clone());
                return Ok(Some(message));
            }

            let notified = self.subscription.ready.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), BrokerError> {
        self.subscription.unacked.lock().await.remove(&message.id);
        Ok(())
    }

    async fn negative_acknowledge(&self, message: &Message) -> Result<(), BrokerError> {
        let Some(mut message) = self.subscription.unacked.lock().await.remove(&message.id) else {
            return Ok(());
        };
        message.redelivery_count += 1;

        let subscription = self.subscription.clone();
        let delay = self.inner.redelivery_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            subscription.push(message).await;
        });

        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);

        // Whatever this consumer still held goes back to the subscription
        let held: Vec<Message> = self
            .subscription
            .unacked
            .lock()
            .await
            .drain()
            .map(|(_, m)| m)
            .collect();
        for message in held {
            self.subscription.push(message).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "persistent://t/ns/partnerships";

    #[tokio::test]
    async fn test_receive_times_out_with_none() {
        let broker = InMemoryBroker::new();
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();

        let received = consumer.receive(Duration::from_millis(20)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_send_then_receive_and_ack() {
        let broker = InMemoryBroker::new();
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();
        let producer = broker.create_producer(TOPIC).await.unwrap();

        producer.send(b"hello".to_vec()).await.unwrap();

        let message = consumer
            .receive(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.payload, b"hello");
        assert_eq!(broker.unacknowledged(TOPIC, "sub").await, 1);

        consumer.acknowledge(&message).await.unwrap();
        assert_eq!(broker.unacknowledged(TOPIC, "sub").await, 0);
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_count() {
        let broker = InMemoryBroker::with_redelivery_delay(Duration::from_millis(10));
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();
        broker.inject(TOPIC, b"x".to_vec()).await.unwrap();

        let first = consumer
            .receive(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        consumer.negative_acknowledge(&first).await.unwrap();

        let again = consumer
            .receive(Duration::from_millis(500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.redelivery_count, 1);
    }

    #[tokio::test]
    async fn test_shared_subscription_delivers_each_message_once() {
        let broker = InMemoryBroker::new();
        let a = broker.subscribe(TOPIC, "sub").await.unwrap();
        let b = broker.subscribe(TOPIC, "sub").await.unwrap();
        broker.inject(TOPIC, b"1".to_vec()).await.unwrap();
        broker.inject(TOPIC, b"2".to_vec()).await.unwrap();

        let first = a.receive(Duration::from_millis(100)).await.unwrap();
        let second = b.receive(Duration::from_millis(100)).await.unwrap();
        let none = a.receive(Duration::from_millis(20)).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first.unwrap().id, second.unwrap().id);
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_separate_subscriptions_each_get_a_copy() {
        let broker = InMemoryBroker::new();
        let a = broker.subscribe(TOPIC, "sub-a").await.unwrap();
        let b = broker.subscribe(TOPIC, "sub-b").await.unwrap();
        broker.inject(TOPIC, b"1".to_vec()).await.unwrap();

        assert!(a.receive(Duration::from_millis(100)).await.unwrap().is_some());
        assert!(b.receive(Duration::from_millis(100)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failing_publishes() {
        let broker = InMemoryBroker::new();
        let producer = broker.create_producer(TOPIC).await.unwrap();

        broker.fail_publishes(true);
        assert!(matches!(
            producer.send(b"x".to_vec()).await,
            Err(BrokerError::SendFailed { .. })
        ));
        assert!(broker.published(TOPIC).await.is_empty());

        broker.fail_publishes(false);
        producer.send(b"x".to_vec()).await.unwrap();
        assert_eq!(broker.published(TOPIC).await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_consumer_errors() {
        let broker = InMemoryBroker::new();
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();
        consumer.close().await.unwrap();

        assert!(matches!(
            consumer.receive(Duration::from_millis(10)).await,
            Err(BrokerError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_log_keeps_only_the_latest_messages() {
        let broker = InMemoryBroker::with_log_capacity(10);
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();

        for i in 0..1000u32 {
            broker.inject(TOPIC, i.to_be_bytes().to_vec()).await.unwrap();
            let message = consumer
                .receive(Duration::from_millis(100))
                .await
                .unwrap()
                .unwrap();
            consumer.acknowledge(&message).await.unwrap();
        }

        let log = broker.published(TOPIC).await;
        assert_eq!(broker.unacknowledged(TOPIC, "sub").await, 0);
        assert_eq!(log.len(), 10);
        assert_eq!(log[9].payload, 999u32.to_be_bytes().to_vec());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_the_log() {
        let broker = InMemoryBroker::with_log_capacity(0);
        let consumer = broker.subscribe(TOPIC, "sub").await.unwrap();
        broker.inject(TOPIC, b"x".to_vec()).await.unwrap();

        assert!(broker.published(TOPIC).await.is_empty());
        assert!(consumer.receive(Duration::from_millis(100)).await.unwrap().is_some());
    }
}

//! Transactional outbox.
//!
//! Events reach the publisher only after the storage transaction that caused
//! them has committed. Storage commit and outbox append happen under the
//! queue lock, so events of a partnership are queued in commit order.
//! Publishing runs under a separate flush lock and never holds the queue
//! lock across a broker call. The queue is flushed strictly in order: a
//! publish failure stops the flush and everything from the failed event
//! onwards stays queued for the next flush.

use std::collections::VecDeque;
use std::sync::Arc;

use common::CorrelationId;
use domain::{DomainEvent, PartnershipEvent};
use messaging::{Broker, EventPublisher, EventStatus};
use storage::{StorageOperation, StoreTransaction};
use tokio::sync::Mutex;

use crate::Result;

/// An event waiting to be published, with its routing.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event: PartnershipEvent,
    pub kind: String,
    pub status: EventStatus,
    pub correlation_id: Option<CorrelationId>,
}

impl PendingEvent {
    pub fn new(event: PartnershipEvent, kind: impl Into<String>, status: EventStatus) -> Self {
        Self {
            event,
            kind: kind.into(),
            status,
            correlation_id: None,
        }
    }

    /// Routes a recorded transition under its own event type.
    pub fn transition(event: PartnershipEvent) -> Self {
        let kind = event.event_type();
        Self::new(event, kind, EventStatus::Success)
    }

    pub fn correlated(mut self, correlation_id: Option<CorrelationId>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// What a flush achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events handed to the broker by this flush.
    pub published: usize,

    /// Events still queued afterwards.
    pub deferred: usize,

    /// Why the flush stopped early, if it did.
    pub error: Option<String>,
}

impl FlushReport {
    pub fn is_complete(&self) -> bool {
        self.deferred == 0
    }
}

/// Queue of committed-but-unpublished events.
pub struct Outbox<B: Broker> {
    publisher: Arc<EventPublisher<B>>,
    queue: Mutex<VecDeque<PendingEvent>>,
    flushing: Mutex<()>,
}

impl<B: Broker> Outbox<B> {
    pub fn new(publisher: Arc<EventPublisher<B>>) -> Self {
        Self {
            publisher,
            queue: Mutex::new(VecDeque::new()),
            flushing: Mutex::new(()),
        }
    }

    /// Returns the publisher events are flushed through.
    pub fn publisher(&self) -> &Arc<EventPublisher<B>> {
        &self.publisher
    }

    /// Returns the number of queued events.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Commits `operations`, queues `events`, then flushes the queue.
    ///
    /// If the storage commit fails, the events are dropped and the error is
    /// returned. A publish failure is not an error: it is reported in the
    /// returned [`FlushReport`] and the events stay queued.
    pub async fn commit<T: StoreTransaction>(
        &self,
        tx: T,
        operations: Vec<StorageOperation>,
        events: Vec<PendingEvent>,
    ) -> Result<FlushReport> {
        {
            let mut queue = self.queue.lock().await;
            tx.commit(operations).await?;
            queue.extend(events);
        }

        Ok(self.flush().await)
    }

    /// Republishes whatever an earlier flush left behind.
    pub async fn retry_pending(&self) -> FlushReport {
        if self.pending().await == 0 {
            return FlushReport::default();
        }

        let report = self.flush().await;
        tracing::info!(
            published = report.published,
            deferred = report.deferred,
            "outbox retry sweep"
        );
        report
    }

    /// Publishes from the front of the queue until it is empty or a publish
    /// fails. Only the holder of the flush lock removes events.
    async fn flush(&self) -> FlushReport {
        let _flushing = self.flushing.lock().await;
        let mut report = FlushReport::default();

        loop {
            let Some(pending) = self.queue.lock().await.front().cloned() else {
                break;
            };
            let result = self
                .publisher
                .publish(
                    &pending.event,
                    &pending.kind,
                    &pending.status,
                    pending.correlation_id,
                )
                .await;

            match result {
                Ok(_) => {
                    self.queue.lock().await.pop_front();
                    report.published += 1;
                    metrics::counter!("outbox_events_published_total").increment(1);
                }
                Err(e) => {
                    let queued = self.pending().await;
                    metrics::counter!("outbox_events_requeued_total").increment(queued as u64);
                    tracing::warn!(
                        queued,
                        error = %e,
                        "publish failed, events stay queued"
                    );
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        report.deferred = self.pending().await;
        report
    }
}

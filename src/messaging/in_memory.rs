use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::metrics::Metrics;
use super::bus::{
    dead_letter_topic, dispatch, BusError, DeliveryPolicy, Disposition, MessageBus, MessageHandler,
    Subscription,
};

// ============================================================================
// In-Memory Message Bus
// ============================================================================
//
// Process-local implementation of the bus contract. Each topic is a FIFO
// queue; a subscription pulls one message, runs the handler, then acks
// (drops), requeues at the front after the redelivery backoff, or moves the
// message to the dead-letter topic.
//
// Used by the test suite and by `SCORING_TRANSPORT=memory` local runs.
//
// ============================================================================

/// Per-topic delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub published: u64,
    pub acked: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
}

struct QueuedMessage {
    payload: Vec<u8>,
    deliveries: u32,
}

#[derive(Default)]
struct TopicQueue {
    messages: VecDeque<QueuedMessage>,
    notify: Arc<Notify>,
    stats: TopicStats,
}

#[derive(Clone)]
pub struct InMemoryBus {
    topics: Arc<Mutex<HashMap<String, TopicQueue>>>,
    policy: DeliveryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}

impl InMemoryBus {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Remove and return every message waiting on `topic`.
    pub async fn drain(&self, topic: &str) -> Vec<Vec<u8>> {
        let mut topics = self.topics.lock().await;
        topics
            .get_mut(topic)
            .map(|queue| queue.messages.drain(..).map(|m| m.payload).collect())
            .unwrap_or_default()
    }

    pub async fn pending(&self, topic: &str) -> usize {
        let topics = self.topics.lock().await;
        topics.get(topic).map(|queue| queue.messages.len()).unwrap_or(0)
    }

    pub async fn stats(&self, topic: &str) -> TopicStats {
        let topics = self.topics.lock().await;
        topics.get(topic).map(|queue| queue.stats.clone()).unwrap_or_default()
    }

    async fn enqueue(&self, topic: &str, message: QueuedMessage, front: bool) {
        let mut topics = self.topics.lock().await;
        let queue = topics.entry(topic.to_string()).or_default();

        if front {
            queue.stats.requeued += 1;
            queue.messages.push_front(message);
        } else {
            queue.stats.published += 1;
            queue.messages.push_back(message);
        }
        queue.notify.notify_one();
    }

    /// Next message on `topic`, or the notifier to wait on when empty.
    async fn next_message(&self, topic: &str) -> Result<QueuedMessage, Arc<Notify>> {
        let mut topics = self.topics.lock().await;
        let queue = topics.entry(topic.to_string()).or_default();

        match queue.messages.pop_front() {
            Some(message) => Ok(message),
            None => Err(queue.notify.clone()),
        }
    }

    async fn settle(&self, topic: &str, disposition: Disposition) {
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery(topic, disposition.as_str());
        }

        let mut topics = self.topics.lock().await;
        let stats = &mut topics.entry(topic.to_string()).or_default().stats;
        match disposition {
            Disposition::Ack => stats.acked += 1,
            Disposition::DeadLetter => stats.dead_lettered += 1,
            // counted when the message is put back
            Disposition::Requeue => {}
        }
    }

    async fn consume(self, topic: String, handler: Arc<dyn MessageHandler>) {
        tracing::info!(topic = %topic, "In-memory subscription started");

        loop {
            let mut message = match self.next_message(&topic).await {
                Ok(message) => message,
                Err(notify) => {
                    notify.notified().await;
                    continue;
                }
            };

            message.deliveries += 1;
            let disposition =
                dispatch(handler.as_ref(), &topic, &message.payload, message.deliveries, &self.policy)
                    .await;
            self.settle(&topic, disposition).await;

            match disposition {
                Disposition::Ack => {}
                Disposition::Requeue => {
                    tokio::time::sleep(self.policy.redelivery.delay_for(message.deliveries)).await;
                    self.enqueue(&topic, message, true).await;
                }
                Disposition::DeadLetter => {
                    let dlq = dead_letter_topic(&topic);
                    let dead = QueuedMessage {
                        payload: message.payload,
                        deliveries: 0,
                    };
                    self.enqueue(&dlq, dead, false).await;
                }
            }
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        self.enqueue(
            topic,
            QueuedMessage {
                payload: payload.to_vec(),
                deliveries: 0,
            },
            false,
        )
        .await;

        tracing::debug!(topic = %topic, bytes = payload.len(), "Published to in-memory bus");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        let worker = self.clone();
        let owned_topic = topic.to_string();
        let handle = tokio::spawn(worker.consume(owned_topic, handler));

        Ok(Subscription::new(topic, handle))
    }
}

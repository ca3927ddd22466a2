use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::utils::{IsTransient, RetryConfig};

// ============================================================================
// Message Bus Abstraction
// ============================================================================
//
// Minimal publish/subscribe capability the scoring worker depends on.
//
// Delivery contract shared by every implementation:
// - at-least-once delivery, one queue (topic) per message kind
// - one message in flight per subscription; the next one is only pulled
//   after the handler returned
// - handler `Ok`  -> ack
// - handler `Err` -> nack + requeue, with backoff, until `max_deliveries`
//   is reached; the message is then moved to `<topic>.dlq`
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BusError {
    #[error("broker error on '{topic}': {message}")]
    Broker { topic: String, message: String },

    #[error("circuit breaker open, refusing to publish to '{0}'")]
    CircuitOpen(String),

    #[error("bus configuration error: {0}")]
    Configuration(String),

    #[error("bus is closed")]
    Closed,
}

impl IsTransient for BusError {
    fn is_transient(&self) -> bool {
        matches!(self, BusError::Broker { .. })
    }
}

/// Consumer side of a subscription. Returning an error asks the transport to
/// redeliver the message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a JSON payload to `topic`. Persistent delivery.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Start consuming `topic` with `handler` on a background task.
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError>;
}

/// Redelivery rules applied by a transport to nacked messages
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPolicy {
    /// Deliveries (first one included) before a message is dead-lettered
    pub max_deliveries: u32,
    /// Backoff between redeliveries
    pub redelivery: RetryConfig,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            redelivery: RetryConfig {
                max_attempts: 5,
                initial_delay: std::time::Duration::from_millis(500),
                max_delay: std::time::Duration::from_secs(30),
                multiplier: 2.0,
            },
        }
    }
}

impl DeliveryPolicy {
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }
}

/// Queue receiving messages that exhausted their deliveries.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}.dlq")
}

/// What a transport does with a message after the handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
    DeadLetter,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Requeue => "requeue",
            Disposition::DeadLetter => "dead_letter",
        }
    }
}

/// Run the handler for one delivery and decide the message's fate.
/// `delivery` is 1-based.
pub(crate) async fn dispatch(
    handler: &dyn MessageHandler,
    topic: &str,
    payload: &[u8],
    delivery: u32,
    policy: &DeliveryPolicy,
) -> Disposition {
    match handler.handle(payload).await {
        Ok(()) => {
            tracing::debug!(topic = %topic, delivery = delivery, "Message acknowledged");
            Disposition::Ack
        }
        Err(e) if delivery >= policy.max_deliveries => {
            tracing::error!(
                error = %e,
                topic = %topic,
                delivery = delivery,
                dead_letter_topic = %dead_letter_topic(topic),
                "Message exhausted its deliveries, dead-lettering"
            );
            Disposition::DeadLetter
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                topic = %topic,
                delivery = delivery,
                "Handler failed, message will be redelivered"
            );
            Disposition::Requeue
        }
    }
}

/// Handle on a running subscription task
pub struct Subscription {
    topic: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            topic: topic.into(),
            handle,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop consuming. A message being handled is abandoned unacknowledged
    /// and will be redelivered by the broker.
    pub fn shutdown(self) {
        tracing::info!(topic = %self.topic, "Stopping subscription");
        self.handle.abort();
    }
}

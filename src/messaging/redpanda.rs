use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaResult,
    message::{Header, Message, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
    Offset, TopicPartitionList,
};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryConfig,
};
use super::bus::{
    dead_letter_topic, dispatch, BusError, DeliveryPolicy, Disposition, MessageBus, MessageHandler,
    Subscription,
};

// ============================================================================
// Redpanda (Kafka protocol) Message Bus
// ============================================================================
//
// Publish: FutureProducer with acks=all, guarded by a circuit breaker and
// retried on transient broker errors.
//
// Subscribe: StreamConsumer with manual offset commits. A message is handled
// in place until it is acked or dead-lettered; only then is its offset
// committed, so a crash in between leaves it for the next consumer.
//
// ============================================================================

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_secs(1);

fn producer_config(brokers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .set("acks", "all");
    config
}

fn consumer_config(brokers: &str, group: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("group.id", group)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest");
    config
}

fn commit_offset(
    consumer: &StreamConsumer,
    topic: &str,
    partition: i32,
    offset: i64,
) -> KafkaResult<()> {
    let mut partitions = TopicPartitionList::new();
    partitions.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
    consumer.commit(&partitions, CommitMode::Async)
}

#[derive(Clone)]
pub struct RedpandaBus {
    brokers: String,
    consumer_group: String,
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    retry_config: RetryConfig,
    policy: DeliveryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl RedpandaBus {
    pub fn new(brokers: &str, consumer_group: &str, policy: DeliveryPolicy) -> Result<Self, BusError> {
        let producer: FutureProducer = producer_config(brokers).create().map_err(|e| {
            BusError::Configuration(format!("failed to create Redpanda producer: {e}"))
        })?;

        Ok(Self {
            brokers: brokers.to_string(),
            consumer_group: consumer_group.to_string(),
            producer,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            retry_config: RetryConfig::publish(),
            policy,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// One broker round trip through the circuit breaker.
    async fn send_once(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let outcome = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::<(), [u8]>::to(topic)
                    .payload(payload)
                    .headers(OwnedHeaders::new().insert(Header {
                        key: "content-type",
                        value: Some("application/json"),
                    }));

                self.producer
                    .send(record, SEND_TIMEOUT)
                    .await
                    .map(|_| ())
                    .map_err(|(e, _)| BusError::Broker {
                        topic: topic.to_string(),
                        message: e.to_string(),
                    })
            })
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_breaker_state(self.circuit_breaker.state().await.as_gauge());
        }

        match outcome {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => Err(BusError::CircuitOpen(topic.to_string())),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }

    fn record_delivery(&self, topic: &str, disposition: Disposition) {
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery(topic, disposition.as_str());
        }
    }

    /// Keep trying to park a message on the dead-letter topic. The source
    /// offset must not be committed before this succeeds.
    async fn dead_letter(&self, topic: &str, payload: &[u8]) {
        let dlq = dead_letter_topic(topic);
        let mut attempt = 0;

        while let Err(e) = self.publish(&dlq, payload).await {
            attempt += 1;
            let delay = self.policy.redelivery.delay_for(attempt);
            tracing::error!(
                error = %e,
                topic = %topic,
                dead_letter_topic = %dlq,
                attempt = attempt,
                "Failed to dead-letter message, offset stays uncommitted"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn consume(self, consumer: StreamConsumer, topic: String, handler: Arc<dyn MessageHandler>) {
        tracing::info!(
            topic = %topic,
            group = %self.consumer_group,
            "Redpanda subscription started"
        );

        loop {
            let received = consumer.recv().await.map(|message| {
                (
                    message.partition(),
                    message.offset(),
                    message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                )
            });

            let (partition, offset, payload) = match received {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, topic = %topic, "Error receiving from Redpanda");
                    tokio::time::sleep(RECEIVE_ERROR_PAUSE).await;
                    continue;
                }
            };

            let mut delivery = 0;
            loop {
                delivery += 1;
                let disposition =
                    dispatch(handler.as_ref(), &topic, &payload, delivery, &self.policy).await;
                self.record_delivery(&topic, disposition);

                match disposition {
                    Disposition::Ack => break,
                    Disposition::Requeue => {
                        tokio::time::sleep(self.policy.redelivery.delay_for(delivery)).await;
                    }
                    Disposition::DeadLetter => {
                        self.dead_letter(&topic, &payload).await;
                        break;
                    }
                }
            }

            if let Err(e) = commit_offset(&consumer, &topic, partition, offset) {
                tracing::error!(
                    error = %e,
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    "Failed to commit offset"
                );
            }
        }
    }
}

#[async_trait]
impl MessageBus for RedpandaBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let result = retry_on_transient(self.retry_config.clone(), move |_attempt| {
            self.send_once(topic, payload)
        })
        .await
        .into_result();

        match &result {
            Ok(()) => tracing::debug!(topic = %topic, bytes = payload.len(), "Published to Redpanda"),
            Err(e) => tracing::error!(error = %e, topic = %topic, "Failed to publish to Redpanda"),
        }
        result
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        let consumer: StreamConsumer = consumer_config(&self.brokers, &self.consumer_group)
            .create()
            .map_err(|e| BusError::Configuration(format!("failed to create Redpanda consumer: {e}")))?;

        consumer.subscribe(&[topic]).map_err(|e| BusError::Broker {
            topic: topic.to_string(),
            message: e.to_string(),
        })?;

        let worker = self.clone();
        let handle = tokio::spawn(worker.consume(consumer, topic.to_string(), handler));

        Ok(Subscription::new(topic, handle))
    }
}

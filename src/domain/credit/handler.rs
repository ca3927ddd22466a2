use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::integration::{decode_event, encode_event, IntegrationEvent};
use crate::messaging::{MessageBus, MessageHandler};
use crate::metrics::Metrics;
use super::errors::{ProcessingError, ScoringError, ValidationError};
use super::events::{CustomerRegistered, ScoringCompleted, ScoringFailed};
use super::policy;
use super::scoring::{CreditScorer, StandardScorer, MAX_SCORE};
use super::value_objects::{Applicant, ScoringResult};

// ============================================================================
// Registration Event Handler
// ============================================================================
//
// One registration in, exactly one outcome event out:
//
//   valid payload      -> ScoringCompleted on the completed queue
//   invalid payload    -> ScoringFailed (violation), message acked
//   unexpected error   -> ScoringFailed (generic), error returned -> requeue
//
// Publishing a failure event is best-effort and never replaces the error
// being reported.
//
// ============================================================================

pub const INTERNAL_ERROR_REASON: &str = "internal error while processing credit analysis";

/// Terminal outcome of a handled registration
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringOutcome {
    Scored(ScoringCompleted),
    Rejected(ScoringFailed),
}

impl ScoringOutcome {
    pub fn customer_id(&self) -> Uuid {
        match self {
            ScoringOutcome::Scored(event) => event.customer_id,
            ScoringOutcome::Rejected(event) => event.customer_id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScoringOutcome::Scored(_) => "completed",
            ScoringOutcome::Rejected(_) => "rejected",
        }
    }
}

pub struct RegistrationEventHandler {
    scorer: Arc<dyn CreditScorer>,
    bus: Arc<dyn MessageBus>,
    queues: QueueConfig,
    metrics: Arc<Metrics>,
}

impl RegistrationEventHandler {
    pub fn new(bus: Arc<dyn MessageBus>, queues: QueueConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            scorer: Arc::new(StandardScorer),
            bus,
            queues,
            metrics,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn CreditScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Run one registration through validation, scoring and publication.
    ///
    /// `Ok` means the message is done with, whether it was scored or
    /// rejected. `Err` means it should be redelivered; a generic failure
    /// event has already been attempted.
    pub async fn process(&self, event: &CustomerRegistered) -> Result<ScoringOutcome, ScoringError> {
        let applicant = match event.validate() {
            Ok(applicant) => applicant,
            Err(violation) => {
                tracing::warn!(
                    customer_id = %event.customer_id,
                    error = %violation,
                    "Registration rejected by validation"
                );
                return Ok(ScoringOutcome::Rejected(
                    self.reject(event.customer_id, &violation).await,
                ));
            }
        };

        match self.score_and_publish(&applicant).await {
            Ok(completed) => {
                tracing::info!(
                    customer_id = %completed.customer_id,
                    score = completed.score,
                    ranking = completed.ranking,
                    eligible = completed.eligible,
                    "Credit analysis completed"
                );
                Ok(ScoringOutcome::Scored(completed))
            }
            Err(error) => {
                tracing::error!(
                    customer_id = %applicant.customer_id,
                    error = %error,
                    kind = error.kind(),
                    "Credit analysis failed"
                );
                let failed = ScoringFailed::new(applicant.customer_id, INTERNAL_ERROR_REASON);
                self.publish_failure(&failed).await;
                Err(error)
            }
        }
    }

    async fn reject(&self, customer_id: Uuid, violation: &ValidationError) -> ScoringFailed {
        let failed = ScoringFailed::new(customer_id, violation.to_string());
        self.publish_failure(&failed).await;
        failed
    }

    /// score -> ranking -> eligibility -> limit -> max cards -> reason
    fn assess(&self, applicant: &Applicant) -> Result<ScoringResult, ProcessingError> {
        let score = self.scorer.score(applicant);
        if score > MAX_SCORE {
            return Err(ProcessingError::OutOfRange {
                field: "score",
                value: score.to_string(),
            });
        }

        let ranking = self.scorer.ranking(score);
        if !(1..=5).contains(&ranking) {
            return Err(ProcessingError::OutOfRange {
                field: "ranking",
                value: ranking.to_string(),
            });
        }

        let eligible = policy::is_eligible(score, ranking);

        let credit_limit = self.scorer.credit_limit(score, applicant.income, applicant.history);
        if credit_limit < Decimal::ZERO {
            return Err(ProcessingError::OutOfRange {
                field: "credit_limit",
                value: credit_limit.to_string(),
            });
        }

        let max_cards = self.scorer.max_cards(ranking);
        if !matches!(max_cards, 0..=3 | 5) {
            return Err(ProcessingError::OutOfRange {
                field: "max_cards",
                value: max_cards.to_string(),
            });
        }

        let reason = policy::determine_reason(eligible, score, ranking, applicant.history);

        Ok(ScoringResult {
            score,
            ranking,
            eligible,
            reason,
            credit_limit,
            max_cards,
        })
    }

    async fn score_and_publish(&self, applicant: &Applicant) -> Result<ScoringCompleted, ScoringError> {
        let result = self.assess(applicant)?;
        let completed = ScoringCompleted::new(applicant.customer_id, result);
        self.publish_event(&self.queues.completed, &completed).await?;

        Ok(completed)
    }

    /// Encode an outbound event and put it on `topic`.
    async fn publish_event<E: IntegrationEvent>(&self, topic: &str, event: &E) -> Result<(), ScoringError> {
        let payload = encode_event(event).map_err(ProcessingError::from)?;

        self.bus
            .publish(topic, &payload)
            .await
            .map_err(|source| ScoringError::Publication {
                topic: topic.to_string(),
                source,
            })?;

        tracing::debug!(
            event_type = E::event_type(),
            event_id = %event.metadata().event_id,
            topic = %topic,
            "Published event"
        );
        Ok(())
    }

    async fn publish_failure(&self, failed: &ScoringFailed) {
        let topic = &self.queues.failed;

        if let Err(e) = self.publish_event(topic, failed).await {
            tracing::error!(
                customer_id = %failed.customer_id,
                topic = %topic,
                error = %e,
                "Failed to publish scoring failure event"
            );
            self.metrics.record_failure_publish_error(topic);
        }
    }
}

/// Best-effort customer id from a payload that did not decode as a whole.
fn salvage_customer_id(payload: &[u8]) -> Uuid {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|body| {
            body.get("customerId")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::parse_str(id).ok())
        })
        .unwrap_or_else(Uuid::nil)
}

#[async_trait]
impl MessageHandler for RegistrationEventHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let started = Instant::now();
        self.metrics.record_registration();

        let event: CustomerRegistered = match decode_event(payload) {
            Ok(event) => event,
            Err(e) => {
                let customer_id = salvage_customer_id(payload);
                let violation = ValidationError::MalformedPayload(e.to_string());
                tracing::warn!(
                    customer_id = %customer_id,
                    error = %violation,
                    "Undecodable registration payload"
                );
                self.reject(customer_id, &violation).await;
                self.metrics
                    .record_outcome("rejected", started.elapsed().as_secs_f64());
                return Ok(());
            }
        };

        match self.process(&event).await {
            Ok(outcome) => {
                if let ScoringOutcome::Scored(completed) = &outcome {
                    self.metrics.record_score(completed.score, completed.ranking);
                }
                tracing::debug!(
                    customer_id = %outcome.customer_id(),
                    outcome = outcome.label(),
                    "Registration handled"
                );
                self.metrics
                    .record_outcome(outcome.label(), started.elapsed().as_secs_f64());
                Ok(())
            }
            Err(error) => {
                self.metrics
                    .record_outcome("failed", started.elapsed().as_secs_f64());
                Err(anyhow::Error::new(error)
                    .context(format!("credit analysis for customer {}", event.customer_id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::events::PRODUCER;
    use crate::domain::credit::value_objects::HistoryCategory;
    use crate::messaging::{BusError, InMemoryBus, Subscription};

    /// Wraps an in-memory bus and refuses publishes to the given topics.
    struct FailingBus {
        inner: InMemoryBus,
        failing: Vec<String>,
    }

    #[async_trait]
    impl MessageBus for FailingBus {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
            if self.failing.iter().any(|failing| failing == topic) {
                return Err(BusError::Broker {
                    topic: topic.to_string(),
                    message: "broker unavailable".to_string(),
                });
            }
            self.inner.publish(topic, payload).await
        }

        async fn subscribe(
            &self,
            topic: &str,
            handler: Arc<dyn MessageHandler>,
        ) -> Result<Subscription, BusError> {
            self.inner.subscribe(topic, handler).await
        }
    }

    /// Reports a ranking outside 1..=5.
    struct FaultyScorer;

    impl CreditScorer for FaultyScorer {
        fn score(&self, _applicant: &Applicant) -> u32 {
            700
        }

        fn ranking(&self, _score: u32) -> u8 {
            9
        }

        fn credit_limit(&self, _score: u32, income: Decimal, _history: HistoryCategory) -> Decimal {
            income
        }

        fn max_cards(&self, _ranking: u8) -> u8 {
            3
        }
    }

    struct Fixture {
        bus: InMemoryBus,
        metrics: Arc<Metrics>,
        handler: RegistrationEventHandler,
    }

    fn fixture(failing_topics: &[&str]) -> Fixture {
        let bus = InMemoryBus::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let transport: Arc<dyn MessageBus> = Arc::new(FailingBus {
            inner: bus.clone(),
            failing: failing_topics.iter().map(|topic| topic.to_string()).collect(),
        });
        let handler = RegistrationEventHandler::new(transport, QueueConfig::default(), metrics.clone());

        Fixture { bus, metrics, handler }
    }

    fn registration(income: i64, history: &str, age: i32, national_id: &str) -> CustomerRegistered {
        CustomerRegistered {
            customer_id: Uuid::new_v4(),
            name: "Ana Pereira".to_string(),
            national_id: national_id.to_string(),
            email: "ana@example.com".to_string(),
            income: Decimal::from(income),
            age,
            history_category: history.to_string(),
            birth_date: None,
        }
    }

    async fn failures(bus: &InMemoryBus) -> Vec<ScoringFailed> {
        bus.drain("credit.scoring.failed")
            .await
            .iter()
            .map(|payload| decode_event(payload).unwrap())
            .collect()
    }

    async fn completions(bus: &InMemoryBus) -> Vec<ScoringCompleted> {
        bus.drain("credit.scoring.completed")
            .await
            .iter()
            .map(|payload| decode_event(payload).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_prime_applicant_gets_maximum_limit() {
        let Fixture { bus, handler, .. } = fixture(&[]);
        let event = registration(12_000, "GOOD", 30, "529.982.247-25");

        let outcome = handler.process(&event).await.unwrap();

        let published = completions(&bus).await;
        assert_eq!(published.len(), 1);
        assert_eq!(outcome, ScoringOutcome::Scored(published[0].clone()));

        let completed = &published[0];
        assert_eq!(completed.customer_id, event.customer_id);
        assert_eq!(completed.score, 1000);
        assert_eq!(completed.ranking, 5);
        assert!(completed.eligible);
        assert_eq!(completed.reason, "Excellent credit rating");
        assert_eq!(completed.credit_limit, Decimal::from(100_000));
        assert_eq!(completed.max_cards, 5);
        assert!(failures(&bus).await.is_empty());
    }

    #[tokio::test]
    async fn test_weak_applicant_is_scored_but_denied() {
        let Fixture { bus, handler, .. } = fixture(&[]);
        let event = registration(500, "BAD", 70, "1234");

        handler.process(&event).await.unwrap();

        let completed = completions(&bus).await.remove(0);
        assert_eq!(completed.score, 50);
        assert_eq!(completed.ranking, 1);
        assert!(!completed.eligible);
        assert!(completed.reason.contains("score"), "reason: {}", completed.reason);
        assert_eq!(completed.credit_limit, Decimal::from(500));
        assert_eq!(completed.max_cards, 1);
    }

    #[tokio::test]
    async fn test_underage_registration_is_rejected_and_acked() {
        let Fixture { bus, metrics, handler } = fixture(&[]);
        let event = registration(3_000, "REGULAR", 15, "52998224725");
        let payload = encode_event(&event).unwrap();

        MessageHandler::handle(&handler, &payload).await.unwrap();

        let failed = failures(&bus).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].customer_id, event.customer_id);
        assert!(failed[0].reason.contains("age"), "reason: {}", failed[0].reason);
        assert!(failed[0].retryable);
        assert!(completions(&bus).await.is_empty());
        assert_eq!(metrics.scoring_outcomes.with_label_values(&["rejected"]).get(), 1);
    }

    #[tokio::test]
    async fn test_unknown_history_category_is_rejected() {
        let Fixture { bus, handler, .. } = fixture(&[]);
        let event = registration(3_000, "EXCELLENT", 40, "52998224725");

        let outcome = handler.process(&event).await.unwrap();

        assert!(matches!(outcome, ScoringOutcome::Rejected(_)));
        assert!(failures(&bus).await[0].reason.contains("EXCELLENT"));
    }

    #[tokio::test]
    async fn test_completion_publish_failure_is_returned_for_redelivery() {
        let Fixture { bus, metrics, handler } = fixture(&["credit.scoring.completed"]);
        let event = registration(12_000, "GOOD", 30, "52998224725");

        let error = handler.process(&event).await.unwrap_err();
        assert!(matches!(
            &error,
            ScoringError::Publication { topic, .. } if topic == "credit.scoring.completed"
        ));

        let failed = failures(&bus).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].reason, INTERNAL_ERROR_REASON);
        assert_eq!(failed[0].customer_id, event.customer_id);

        let payload = encode_event(&event).unwrap();
        assert!(MessageHandler::handle(&handler, &payload).await.is_err());
        assert_eq!(metrics.scoring_outcomes.with_label_values(&["failed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_failure_event_outage_never_replaces_original_error() {
        let Fixture { metrics, handler, .. } =
            fixture(&["credit.scoring.completed", "credit.scoring.failed"]);
        let event = registration(12_000, "GOOD", 30, "52998224725");

        let error = handler.process(&event).await.unwrap_err();

        assert!(matches!(
            &error,
            ScoringError::Publication { topic, .. } if topic == "credit.scoring.completed"
        ));
        assert_eq!(
            metrics
                .failure_publish_errors
                .with_label_values(&["credit.scoring.failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_rejection_is_handled_even_when_failure_queue_is_down() {
        let Fixture { metrics, handler, .. } = fixture(&["credit.scoring.failed"]);
        let event = registration(3_000, "GOOD", 121, "52998224725");

        let outcome = handler.process(&event).await.unwrap();

        assert!(matches!(outcome, ScoringOutcome::Rejected(ref failed) if failed.reason.contains("121")));
        assert_eq!(
            metrics
                .failure_publish_errors
                .with_label_values(&["credit.scoring.failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_scorer_invariant_violation_is_a_processing_error() {
        let Fixture { bus, handler, .. } = fixture(&[]);
        let handler = handler.with_scorer(Arc::new(FaultyScorer));
        let event = registration(8_000, "GOOD", 30, "52998224725");

        let error = handler.process(&event).await.unwrap_err();

        assert_eq!(error.kind(), "processing");
        assert!(error.to_string().contains("ranking"));
        assert!(completions(&bus).await.is_empty());
        assert_eq!(failures(&bus).await[0].reason, INTERNAL_ERROR_REASON);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_rejected_and_acked() {
        let Fixture { bus, handler, .. } = fixture(&[]);

        MessageHandler::handle(&handler, b"{not json").await.unwrap();

        let failed = failures(&bus).await;
        assert_eq!(failed.len(), 1);
        assert!(failed[0].customer_id.is_nil());
        assert!(failed[0].reason.starts_with("malformed registration payload"));
    }

    #[tokio::test]
    async fn test_customer_id_is_salvaged_from_mistyped_payload() {
        let Fixture { bus, handler, .. } = fixture(&[]);
        let customer_id = Uuid::new_v4();
        let payload = format!(r#"{{"customerId":"{customer_id}","age":"thirty"}}"#);

        MessageHandler::handle(&handler, payload.as_bytes()).await.unwrap();

        assert_eq!(failures(&bus).await[0].customer_id, customer_id);
    }

    #[tokio::test]
    async fn test_income_near_decimal_max_is_scored_at_limit_cap() {
        let Fixture { bus, metrics, handler } = fixture(&[]);
        let mut event = registration(1, "GOOD", 30, "52998224725");
        // survives the f64 wire encoding, overflows once multiplied by 10
        event.income = Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0);
        let payload = encode_event(&event).unwrap();

        MessageHandler::handle(&handler, &payload).await.unwrap();

        let completed = completions(&bus).await;
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].customer_id, event.customer_id);
        assert_eq!(completed[0].score, 1000);
        assert_eq!(completed[0].credit_limit, Decimal::from(100_000));
        assert!(failures(&bus).await.is_empty());
        assert_eq!(metrics.scoring_outcomes.with_label_values(&["completed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_outbound_events_name_their_producer() {
        let Fixture { bus, handler, .. } = fixture(&[]);

        handler
            .process(&registration(4_000, "REGULAR", 28, "52998224725"))
            .await
            .unwrap();
        handler
            .process(&registration(4_000, "REGULAR", 16, "52998224725"))
            .await
            .unwrap();

        let completed = completions(&bus).await;
        let failed = failures(&bus).await;
        assert_eq!(completed[0].metadata.created_by.as_deref(), Some(PRODUCER));
        assert_eq!(failed[0].metadata.created_by.as_deref(), Some(PRODUCER));
    }
}

// Private module declaration
mod server;

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the scoring worker
// ============================================================================
//
// - Registrations received and their outcome (completed / rejected / failed)
// - Score and ranking distribution of completed analyses
// - Analysis latency
// - Failure events that could not be published
// - Transport deliveries by disposition (ack / requeue / dead_letter)
// - Broker circuit breaker state
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub registrations_received: IntCounter,
    pub scoring_outcomes: IntCounterVec,
    pub rankings: IntCounterVec,
    pub score_distribution: Histogram,
    pub scoring_duration: HistogramVec,

    pub failure_publish_errors: IntCounterVec,

    pub deliveries: IntCounterVec,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let registrations_received = IntCounter::new(
            "scoring_registrations_received_total",
            "Customer registration events received for credit analysis",
        )?;
        registry.register(Box::new(registrations_received.clone()))?;

        let scoring_outcomes = IntCounterVec::new(
            Opts::new("scoring_outcomes_total", "Credit analyses by terminal outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(scoring_outcomes.clone()))?;

        let rankings = IntCounterVec::new(
            Opts::new("scoring_rankings_total", "Completed analyses by ranking"),
            &["ranking"],
        )?;
        registry.register(Box::new(rankings.clone()))?;

        let score_distribution = Histogram::with_opts(
            HistogramOpts::new("scoring_score", "Distribution of computed credit scores")
                .buckets(vec![200.0, 400.0, 600.0, 800.0, 1000.0]),
        )?;
        registry.register(Box::new(score_distribution.clone()))?;

        let scoring_duration = HistogramVec::new(
            HistogramOpts::new("scoring_duration_seconds", "Time to handle one registration event")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(scoring_duration.clone()))?;

        let failure_publish_errors = IntCounterVec::new(
            Opts::new(
                "scoring_failure_publish_errors_total",
                "Failure events that could not be published",
            ),
            &["topic"],
        )?;
        registry.register(Box::new(failure_publish_errors.clone()))?;

        let deliveries = IntCounterVec::new(
            Opts::new("bus_deliveries_total", "Consumed messages by disposition"),
            &["topic", "disposition"],
        )?;
        registry.register(Box::new(deliveries.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "bus_circuit_breaker_state",
            "Publish circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            registrations_received,
            scoring_outcomes,
            rankings,
            score_distribution,
            scoring_duration,
            failure_publish_errors,
            deliveries,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_registration(&self) {
        self.registrations_received.inc();
    }

    /// Outcome is one of `completed`, `rejected` or `failed`.
    pub fn record_outcome(&self, outcome: &str, duration_secs: f64) {
        self.scoring_outcomes.with_label_values(&[outcome]).inc();
        self.scoring_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    pub fn record_score(&self, score: u32, ranking: u8) {
        self.score_distribution.observe(f64::from(score));
        self.rankings.with_label_values(&[ranking.to_string().as_str()]).inc();
    }

    pub fn record_failure_publish_error(&self, topic: &str) {
        self.failure_publish_errors.with_label_values(&[topic]).inc();
    }

    pub fn record_delivery(&self, topic: &str, disposition: &str) {
        self.deliveries.with_label_values(&[topic, disposition]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: i64) {
        self.circuit_breaker_state.set(state);
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards broker publishes. After `failure_threshold` consecutive failures the
// breaker opens and publishes fail fast until `open_timeout` has elapsed; the
// next call is then let through as a trial call (half-open) and
// `success_threshold` trial successes close the breaker again.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding used by the metrics registry.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Run `operation` unless the breaker is open.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut guard = self.state.lock().await;

            if guard.state == CircuitState::Open {
                let elapsed = guard.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed < self.config.open_timeout {
                    return Err(CircuitBreakerError::CircuitOpen);
                }

                tracing::info!("Circuit breaker half-open, probing broker");
                guard.state = CircuitState::HalfOpen;
                guard.success_count = 0;
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut guard = self.state.lock().await;

        match guard.state {
            CircuitState::HalfOpen => {
                guard.success_count += 1;
                if guard.success_count >= self.config.success_threshold {
                    tracing::info!(successes = guard.success_count, "Circuit breaker closed");
                    guard.state = CircuitState::Closed;
                    guard.failure_count = 0;
                    guard.success_count = 0;
                    guard.opened_at = None;
                }
            }
            CircuitState::Closed => guard.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut guard = self.state.lock().await;
        guard.failure_count += 1;

        match guard.state {
            CircuitState::Closed if guard.failure_count >= self.config.failure_threshold => {
                tracing::warn!(failures = guard.failure_count, "Circuit breaker opened");
                guard.state = CircuitState::Open;
                guard.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Trial call failed, circuit breaker reopened");
                guard.state = CircuitState::Open;
                guard.success_count = 0;
                guard.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        tracing::info!("Circuit breaker manually reset");
        guard.state = CircuitState::Closed;
        guard.failure_count = 0;
        guard.success_count = 0;
        guard.opened_at = None;
    }
}

use std::env;
use std::str::FromStr;

use crate::messaging::DeliveryPolicy;

// ============================================================================
// Worker Configuration
// ============================================================================
//
// Read from the process environment, after loading a `.env` file when one is
// present. Every variable has a default suitable for a local Redpanda.
//
// ============================================================================

/// Which `MessageBus` implementation the worker runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Redpanda,
    Memory,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redpanda" | "kafka" => Ok(Self::Redpanda),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Queue names for the three message kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub registered: String,
    pub completed: String,
    pub failed: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            registered: "customer.registered".to_string(),
            completed: "credit.scoring.completed".to_string(),
            failed: "credit.scoring.failed".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub transport: Transport,
    pub brokers: String,
    pub consumer_group: String,
    pub queues: QueueConfig,
    pub max_deliveries: u32,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults = QueueConfig::default();

        let transport = value("SCORING_TRANSPORT", "redpanda").parse::<Transport>()?;

        let max_deliveries = value("SCORING_MAX_DELIVERIES", "5")
            .parse::<u32>()
            .ok()
            .filter(|deliveries| *deliveries > 0)
            .ok_or(ConfigError::InvalidMaxDeliveries)?;

        let metrics_port = value("SCORING_METRICS_PORT", "9090")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        Ok(Self {
            transport,
            brokers: value("SCORING_BROKERS", "127.0.0.1:9092"),
            consumer_group: value("SCORING_CONSUMER_GROUP", "credit-scoring"),
            queues: QueueConfig {
                registered: value("SCORING_QUEUE_REGISTERED", &defaults.registered),
                completed: value("SCORING_QUEUE_COMPLETED", &defaults.completed),
                failed: value("SCORING_QUEUE_FAILED", &defaults.failed),
            },
            max_deliveries,
            metrics_port,
        })
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy::default().with_max_deliveries(self.max_deliveries)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SCORING_TRANSPORT must be 'redpanda' or 'memory' (got '{0}')")]
    UnknownTransport(String),

    #[error("SCORING_MAX_DELIVERIES must be a positive integer")]
    InvalidMaxDeliveries,

    #[error("SCORING_METRICS_PORT must be a valid u16")]
    InvalidPort,
}

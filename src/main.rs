use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use credit_scoring::config::{AppConfig, Transport};
use credit_scoring::domain::credit::RegistrationEventHandler;
use credit_scoring::messaging::{InMemoryBus, MessageBus, RedpandaBus};
use credit_scoring::metrics::{self, Metrics};

const SUBSCRIPTION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, overridable with RUST_LOG
    // Example: RUST_LOG=credit_scoring=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,credit_scoring=debug")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        transport = ?config.transport,
        brokers = %config.brokers,
        consumer_group = %config.consumer_group,
        registered = %config.queues.registered,
        completed = %config.queues.completed,
        failed = %config.queues.failed,
        max_deliveries = config.max_deliveries,
        "Starting credit scoring worker"
    );

    // === 1. Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // Metrics HTTP server runs on its own thread with its own actix system
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Message bus ===
    let policy = config.delivery_policy();
    let bus: Arc<dyn MessageBus> = match config.transport {
        Transport::Redpanda => Arc::new(
            RedpandaBus::new(&config.brokers, &config.consumer_group, policy)?
                .with_metrics(metrics.clone()),
        ),
        Transport::Memory => {
            tracing::warn!("Using the in-memory bus; nothing outside this process can reach it");
            Arc::new(InMemoryBus::new(policy).with_metrics(metrics.clone()))
        }
    };

    // === 3. Registration handler ===
    let handler = Arc::new(RegistrationEventHandler::new(
        bus.clone(),
        config.queues.clone(),
        metrics.clone(),
    ));
    let subscription = bus.subscribe(&config.queues.registered, handler).await?;

    tracing::info!(topic = %subscription.topic(), "Waiting for customer registrations");

    // Exit instead of idling if the consumer task stops on its own
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut watchdog = tokio::time::interval(SUBSCRIPTION_CHECK_INTERVAL);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = watchdog.tick() => {
                if subscription.is_finished() {
                    tracing::error!(topic = %subscription.topic(), "Subscription stopped unexpectedly");
                    anyhow::bail!("subscription to '{}' stopped unexpectedly", subscription.topic());
                }
            }
        }
    }

    subscription.shutdown();
    tracing::info!("Credit scoring worker stopped");

    Ok(())
}

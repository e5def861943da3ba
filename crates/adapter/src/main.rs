//! Metrics adapter - Kubernetes custom metrics adapter
//!
//! Keeps a resource ↔ kind mapping cache fresh from API discovery, accepts
//! metric values over HTTP and serves them through the in-memory provider.

use adapter_lib::{
    clock::{Clock, SystemClock},
    external::ExternalMetricIndex,
    health::{components, HealthRegistry},
    identity::IdentityNormalizer,
    mapper::{KubeDiscovery, MappingCache, RegenerationScheduler, TracingErrorSink},
    observability::{AdapterMetrics, StructuredLogger},
    provider::InMemoryProvider,
    store::{KubeObjectLister, MetricStore},
};
use anyhow::{Context, Result};
use metrics_adapter::{api, config::AdapterConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ADAPTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AdapterConfig::load()?;
    info!(
        instance = %config.instance,
        interval_secs = config.discovery_interval_secs,
        preferred_groups = ?config.effective_preferred_groups(),
        "Adapter configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry
        .set_degraded(components::MAPPER, "waiting for first discovery")
        .await;
    health_registry.register(components::STORE).await;

    let metrics = AdapterMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(ADAPTER_VERSION, &config.message);

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let cache = Arc::new(
        MappingCache::builder(Arc::new(KubeDiscovery::new(client.clone())))
            .error_sink(Arc::new(TracingErrorSink::new(metrics.clone())))
            .preferred_groups(config.effective_preferred_groups())
            .build(),
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lister = Arc::new(KubeObjectLister::new(client, cache.clone()));
    let provider = Arc::new(InMemoryProvider::new(
        IdentityNormalizer::new(cache.clone()).with_retry_on_miss(config.retry_on_miss),
        MetricStore::new(lister),
        ExternalMetricIndex::with_sample_entries(clock.clone()),
        clock,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = RegenerationScheduler::new(cache, config.discovery_interval())
        .with_health(health_registry.clone())
        .with_logger(logger.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(
        api::AppState::new(health_registry, metrics, provider, logger.clone())
            .with_ingestion(config.enable_ingestion),
    );

    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, async move {
        let _ = api_shutdown.recv().await;
    }));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task failed");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

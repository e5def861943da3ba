//! Timer-driven mapping regeneration
//!
//! Regenerates the mapping cache on a fixed interval. A slow discovery call
//! delays the next tick instead of overlapping it, so at most one attempt is
//! ever outstanding.

use super::MappingCache;
use crate::error::Result;
use crate::health::{components, HealthRegistry};
use crate::observability::{AdapterMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

/// Default discovery refresh interval (10 minutes)
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub struct RegenerationScheduler {
    cache: Arc<MappingCache>,
    interval: Duration,
    health: Option<HealthRegistry>,
    metrics: AdapterMetrics,
    logger: Option<StructuredLogger>,
}

impl RegenerationScheduler {
    pub fn new(cache: Arc<MappingCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            health: None,
            metrics: AdapterMetrics::new(),
            logger: None,
        }
    }

    /// Report mapper health and readiness to `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run until a shutdown signal arrives. The first tick fires immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting resource mapping scheduler"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down resource mapping scheduler");
                    break;
                }
            }
        }
    }

    /// One regeneration pass, recording its outcome
    pub async fn tick(&self) -> Result<u64> {
        let start = Instant::now();
        let outcome = self.cache.regenerate().await;
        let elapsed = start.elapsed();
        self.metrics.observe_regeneration_latency(elapsed.as_secs_f64());

        match &outcome {
            Ok(generation) => {
                let resources = self.cache.snapshot().len();
                self.metrics.set_snapshot(*generation, resources as i64);
                if let Some(logger) = &self.logger {
                    logger.log_regeneration(*generation, resources, elapsed);
                }
                if let Some(health) = &self.health {
                    health.set_healthy(components::MAPPER).await;
                    health.set_ready(true).await;
                }
            }
            Err(e) => {
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::MAPPER, format!("regeneration failed: {}", e))
                        .await;
                }
            }
        }

        outcome
    }
}

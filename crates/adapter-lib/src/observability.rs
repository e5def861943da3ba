//! Observability infrastructure for the metrics adapter
//!
//! Provides:
//! - Prometheus metrics (regeneration latency and failures, snapshot size, stored records)
//! - Structured event logging with tracing

use crate::labels::LabelSet;
use crate::models::{MetricIdentity, ObjectCoordinate};
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

/// Histogram buckets for discovery round trips (in seconds)
const REGENERATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<AdapterMetricsInner> = OnceLock::new();

struct AdapterMetricsInner {
    regeneration_latency_seconds: Histogram,
    regeneration_errors: IntCounter,
    snapshot_generation: IntGauge,
    mapped_resources: IntGauge,
    stored_records: IntGauge,
    metric_writes: IntCounter,
}

impl AdapterMetricsInner {
    fn new() -> Self {
        Self {
            regeneration_latency_seconds: register_histogram!(
                "metrics_adapter_regeneration_latency_seconds",
                "Time spent regenerating resource mappings from discovery",
                REGENERATION_BUCKETS.to_vec()
            )
            .expect("Failed to register regeneration_latency_seconds"),

            regeneration_errors: register_int_counter!(
                "metrics_adapter_regeneration_errors_total",
                "Total number of failed resource mapping regenerations"
            )
            .expect("Failed to register regeneration_errors"),

            snapshot_generation: register_int_gauge!(
                "metrics_adapter_snapshot_generation",
                "Generation of the published resource mapping snapshot"
            )
            .expect("Failed to register snapshot_generation"),

            mapped_resources: register_int_gauge!(
                "metrics_adapter_mapped_resources",
                "Number of resources in the published mapping snapshot"
            )
            .expect("Failed to register mapped_resources"),

            stored_records: register_int_gauge!(
                "metrics_adapter_stored_records",
                "Number of metric records held in memory"
            )
            .expect("Failed to register stored_records"),

            metric_writes: register_int_counter!(
                "metrics_adapter_metric_writes_total",
                "Total number of metric values written through ingestion"
            )
            .expect("Failed to register metric_writes"),
        }
    }
}

/// Handle to the process-wide adapter metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct AdapterMetrics {
    _private: (),
}

impl Default for AdapterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdapterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdapterMetricsInner {
        GLOBAL_METRICS.get_or_init(AdapterMetricsInner::new)
    }

    pub fn observe_regeneration_latency(&self, duration_secs: f64) {
        self.inner().regeneration_latency_seconds.observe(duration_secs);
    }

    pub fn inc_regeneration_errors(&self) {
        self.inner().regeneration_errors.inc();
    }

    pub fn set_snapshot(&self, generation: u64, resources: i64) {
        self.inner().snapshot_generation.set(generation as i64);
        self.inner().mapped_resources.set(resources);
    }

    pub fn set_stored_records(&self, count: i64) {
        self.inner().stored_records.set(count);
    }

    pub fn inc_metric_writes(&self) {
        self.inner().metric_writes.inc();
    }
}

/// Structured logger for adapter lifecycle and data events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, message: &str) {
        info!(
            event = "adapter_started",
            instance = %self.instance,
            adapter_version = %version,
            "{}", message
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "adapter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Metrics adapter shutting down"
        );
    }

    pub fn log_regeneration(&self, generation: u64, resources: usize, elapsed: Duration) {
        info!(
            event = "mapping_regenerated",
            instance = %self.instance,
            generation = generation,
            resources = resources,
            elapsed_ms = elapsed.as_millis() as u64,
            "Resource mappings regenerated"
        );
    }

    pub fn log_metric_write(
        &self,
        identity: &MetricIdentity,
        coordinate: &ObjectCoordinate,
        value: f64,
        labels: &LabelSet,
    ) {
        info!(
            event = "metric_written",
            instance = %self.instance,
            metric = %identity,
            object = %coordinate,
            value = value,
            labels = %labels,
            "Metric value recorded"
        );
    }
}

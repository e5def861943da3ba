//! Metrics provider capability interface
//!
//! Callers hand providers raw, caller-spelled requests; providers normalize
//! them, resolve values and describe the objects those values belong to.

mod fake;
mod memory;

pub use fake::EmptyProvider;
pub use memory::InMemoryProvider;

use crate::error::Result;
use crate::labels::{LabelSet, Selector};
use crate::models::{MetricIdentity, MetricRequest, ObjectCoordinate};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use async_trait::async_trait;

/// The object a custom metric value describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub described_object: ObjectReference,
    pub metric: String,
    /// The metric label selector, when a non-empty one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValue {
    pub metric_name: String,
    pub metric_labels: LabelSet,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ExternalMetricInfo {
    pub metric: String,
}

/// Serves metrics that describe Kubernetes objects
#[async_trait]
pub trait CustomMetricsProvider: Send + Sync {
    /// The value of a metric for one named object
    async fn get_metric_by_name(
        &self,
        coordinate: &ObjectCoordinate,
        request: &MetricRequest,
        metric_selector: &Selector,
    ) -> Result<MetricValue>;

    /// Values for every object in `namespace` matching `object_selector`
    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        object_selector: &Selector,
        request: &MetricRequest,
        metric_selector: &Selector,
    ) -> Result<Vec<MetricValue>>;

    async fn list_all_metrics(&self) -> Vec<MetricIdentity>;
}

/// Serves metrics not tied to any Kubernetes object
#[async_trait]
pub trait ExternalMetricsProvider: Send + Sync {
    async fn get_external_metric(
        &self,
        namespace: &str,
        metric_selector: &Selector,
        metric_name: &str,
    ) -> Result<Vec<ExternalMetricValue>>;

    async fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo>;
}

/// A provider serving both custom and external metrics
pub trait MetricsProvider: CustomMetricsProvider + ExternalMetricsProvider {}

impl<T: CustomMetricsProvider + ExternalMetricsProvider> MetricsProvider for T {}

use super::{
    CustomMetricsProvider, ExternalMetricInfo, ExternalMetricValue, ExternalMetricsProvider,
    MetricValue,
};
use crate::error::{AdapterError, Result};
use crate::labels::Selector;
use crate::models::{MetricIdentity, MetricRequest, ObjectCoordinate};
use async_trait::async_trait;

/// Provider with no values at all
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProvider;

#[async_trait]
impl CustomMetricsProvider for EmptyProvider {
    async fn get_metric_by_name(
        &self,
        coordinate: &ObjectCoordinate,
        request: &MetricRequest,
        _metric_selector: &Selector,
    ) -> Result<MetricValue> {
        Err(AdapterError::MetricNotFound {
            resource: request.group_resource.clone(),
            metric: request.metric.clone(),
            object: coordinate.name.clone(),
        })
    }

    async fn get_metric_by_selector(
        &self,
        _namespace: &str,
        _object_selector: &Selector,
        _request: &MetricRequest,
        _metric_selector: &Selector,
    ) -> Result<Vec<MetricValue>> {
        Ok(Vec::new())
    }

    async fn list_all_metrics(&self) -> Vec<MetricIdentity> {
        Vec::new()
    }
}

#[async_trait]
impl ExternalMetricsProvider for EmptyProvider {
    async fn get_external_metric(
        &self,
        _namespace: &str,
        _metric_selector: &Selector,
        _metric_name: &str,
    ) -> Result<Vec<ExternalMetricValue>> {
        Ok(Vec::new())
    }

    async fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        Vec::new()
    }
}

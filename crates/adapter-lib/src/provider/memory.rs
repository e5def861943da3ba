//! In-memory metrics provider
//!
//! Custom metric values are written through [`InMemoryProvider::write_metric`]
//! and kept in a [`MetricStore`]; external metrics come from a fixed
//! [`ExternalMetricIndex`].

use super::{
    CustomMetricsProvider, ExternalMetricInfo, ExternalMetricValue, ExternalMetricsProvider,
    MetricValue, ObjectReference,
};
use crate::clock::Clock;
use crate::error::Result;
use crate::external::ExternalMetricIndex;
use crate::identity::IdentityNormalizer;
use crate::labels::{LabelSet, Selector};
use crate::models::{MetricIdentity, MetricRequest, ObjectCoordinate};
use crate::observability::AdapterMetrics;
use crate::store::{MetricRecord, MetricStore};
use async_trait::async_trait;
use std::sync::Arc;

pub struct InMemoryProvider {
    normalizer: IdentityNormalizer,
    store: MetricStore,
    external: ExternalMetricIndex,
    clock: Arc<dyn Clock>,
    metrics: AdapterMetrics,
}

impl InMemoryProvider {
    pub fn new(
        normalizer: IdentityNormalizer,
        store: MetricStore,
        external: ExternalMetricIndex,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            normalizer,
            store,
            external,
            clock,
            metrics: AdapterMetrics::new(),
        }
    }

    pub fn normalizer(&self) -> &IdentityNormalizer {
        &self.normalizer
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Record `value` for the object, stamped with the current time.
    ///
    /// Unknown resources are rejected rather than stored under an
    /// unnormalized key no read could ever reach.
    pub async fn write_metric(
        &self,
        request: &MetricRequest,
        coordinate: ObjectCoordinate,
        value: f64,
        labels: LabelSet,
    ) -> Result<MetricRecord> {
        let normalized = self.normalizer.normalize(request).await?;
        let record = MetricRecord {
            identity: normalized.identity,
            coordinate,
            value,
            labels,
            timestamp: self.clock.now(),
        };

        self.store
            .upsert(
                record.identity.clone(),
                record.coordinate.clone(),
                record.value,
                record.labels.clone(),
                record.timestamp,
            )
            .await;

        self.metrics.inc_metric_writes();
        self.metrics.set_stored_records(self.store.len().await as i64);
        Ok(record)
    }

    fn metric_value(&self, record: MetricRecord, metric_selector: &Selector) -> Result<MetricValue> {
        let gvk = self
            .normalizer
            .cache()
            .kind_for(&record.identity.group_resource().with_version(""))?;

        Ok(MetricValue {
            described_object: ObjectReference {
                api_version: gvk.api_version(),
                kind: gvk.kind,
                namespace: record.coordinate.namespace,
                name: record.coordinate.name,
            },
            metric: record.identity.metric().to_string(),
            selector: (!metric_selector.is_empty()).then(|| metric_selector.to_string()),
            timestamp: record.timestamp,
            value: record.value,
        })
    }
}

#[async_trait]
impl CustomMetricsProvider for InMemoryProvider {
    async fn get_metric_by_name(
        &self,
        coordinate: &ObjectCoordinate,
        request: &MetricRequest,
        metric_selector: &Selector,
    ) -> Result<MetricValue> {
        let normalized = self.normalizer.normalize(request).await?;
        let record = self
            .store
            .get_by_name(&normalized.identity, coordinate, metric_selector)
            .await?;
        self.metric_value(record, metric_selector)
    }

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        object_selector: &Selector,
        request: &MetricRequest,
        metric_selector: &Selector,
    ) -> Result<Vec<MetricValue>> {
        let normalized = self.normalizer.normalize(request).await?;
        let records = self
            .store
            .get_by_selector(&normalized.identity, namespace, object_selector, metric_selector)
            .await?;

        records
            .into_iter()
            .map(|record| self.metric_value(record, metric_selector))
            .collect()
    }

    async fn list_all_metrics(&self) -> Vec<MetricIdentity> {
        self.store.list_known_identities().await
    }
}

#[async_trait]
impl ExternalMetricsProvider for InMemoryProvider {
    async fn get_external_metric(
        &self,
        _namespace: &str,
        metric_selector: &Selector,
        metric_name: &str,
    ) -> Result<Vec<ExternalMetricValue>> {
        Ok(self
            .external
            .query(metric_name, metric_selector)
            .into_iter()
            .map(|sample| ExternalMetricValue {
                metric_name: sample.name,
                metric_labels: sample.labels,
                timestamp: sample.timestamp,
                value: sample.value,
            })
            .collect())
    }

    async fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        self.external
            .metric_names()
            .into_iter()
            .map(|metric| ExternalMetricInfo { metric })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorClass;
    use crate::mapper::{DiscoveredResource, MappingCache, StaticDiscovery};
    use crate::models::GroupResource;
    use crate::store::StaticObjectLister;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        provider: InMemoryProvider,
        lister: Arc<StaticObjectLister>,
    }

    async fn fixture() -> Fixture {
        let discovery = Arc::new(StaticDiscovery::new(vec![
            DiscoveredResource::new("", "v1", "pods", true, "Pod"),
            DiscoveredResource::new("", "v1", "namespaces", false, "Namespace"),
            DiscoveredResource::new("", "v1", "nodes", false, "Node"),
            DiscoveredResource::new("example.com", "v1alpha1", "widgets", true, "Widget"),
        ]));
        let cache = Arc::new(MappingCache::new(discovery));
        cache.regenerate().await.unwrap();

        let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let lister = Arc::new(StaticObjectLister::new());
        let provider = InMemoryProvider::new(
            IdentityNormalizer::new(cache),
            MetricStore::new(lister.clone()),
            ExternalMetricIndex::with_sample_entries(clock.clone()),
            clock,
        );
        Fixture { provider, lister }
    }

    fn pods_request(resource: &str) -> MetricRequest {
        MetricRequest::new(GroupResource::parse(resource), true, "qps")
    }

    #[tokio::test]
    async fn test_write_then_read_by_name() {
        let Fixture { provider, .. } = fixture().await;
        let pod = ObjectCoordinate::new("default", "web-0");

        provider
            .write_metric(&pods_request("pod"), pod.clone(), 12.5, LabelSet::new())
            .await
            .unwrap();

        let value = provider
            .get_metric_by_name(&pod, &pods_request("pods"), &Selector::everything())
            .await
            .unwrap();
        assert_eq!(value.value, 12.5);
        assert_eq!(value.metric, "qps");
        assert_eq!(value.selector, None);
        assert_eq!(
            value.described_object,
            ObjectReference {
                kind: "Pod".into(),
                api_version: "v1".into(),
                namespace: "default".into(),
                name: "web-0".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_metric_value_serializes_in_api_shape() {
        let Fixture { provider, .. } = fixture().await;
        let node = ObjectCoordinate::cluster_scoped("node-1");
        let nodes = MetricRequest::new(GroupResource::new("", "nodes"), false, "temperature");

        provider
            .write_metric(&nodes, node.clone(), 61.5, LabelSet::new())
            .await
            .unwrap();
        let value = provider
            .get_metric_by_name(&node, &nodes, &Selector::everything())
            .await
            .unwrap();

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["describedObject"]["apiVersion"], "v1");
        assert_eq!(json["describedObject"]["kind"], "Node");
        assert!(json["describedObject"].get("namespace").is_none());
        assert!(json.get("selector").is_none());
        assert_eq!(json["value"], 61.5);
    }

    #[tokio::test]
    async fn test_grouped_resource_described_with_group_version() {
        let Fixture { provider, .. } = fixture().await;
        let widget = ObjectCoordinate::new("default", "w1");

        provider
            .write_metric(&pods_request("widgets.example.com"), widget.clone(), 1.0, LabelSet::new())
            .await
            .unwrap();

        let value = provider
            .get_metric_by_name(&widget, &pods_request("Widget"), &Selector::everything())
            .await
            .unwrap();
        assert_eq!(value.described_object.api_version, "example.com/v1alpha1");
        assert_eq!(value.described_object.kind, "Widget");
    }

    #[tokio::test]
    async fn test_metric_selector_is_echoed() {
        let Fixture { provider, .. } = fixture().await;
        let pod = ObjectCoordinate::new("default", "web-0");
        let labels: LabelSet = [("path", "api")].into_iter().collect();

        provider
            .write_metric(&pods_request("pods"), pod.clone(), 3.0, labels)
            .await
            .unwrap();

        let selector = Selector::parse("path=api").unwrap();
        let value = provider
            .get_metric_by_name(&pod, &pods_request("pods"), &selector)
            .await
            .unwrap();
        assert_eq!(value.selector.as_deref(), Some("path=api"));
    }

    #[tokio::test]
    async fn test_write_for_unknown_resource_is_rejected() {
        let Fixture { provider, .. } = fixture().await;

        let err = provider
            .write_metric(
                &pods_request("gadgets"),
                ObjectCoordinate::new("default", "g"),
                1.0,
                LabelSet::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert!(provider.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_read_by_selector_follows_lister_order() {
        let Fixture { provider, lister } = fixture().await;
        let pods = GroupResource::new("", "pods");
        let web: LabelSet = [("app", "web")].into_iter().collect();
        for name in ["c", "a", "b"] {
            lister.add_object(pods.clone(), "default", name, web.clone());
        }

        for (name, value) in [("a", 1.0), ("c", 3.0)] {
            provider
                .write_metric(&pods_request("pods"), ObjectCoordinate::new("default", name), value, LabelSet::new())
                .await
                .unwrap();
        }

        let values = provider
            .get_metric_by_selector(
                "default",
                &Selector::parse("app=web").unwrap(),
                &pods_request("pod"),
                &Selector::everything(),
            )
            .await
            .unwrap();
        let names: Vec<&str> = values.iter().map(|v| v.described_object.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_list_all_metrics_is_deduplicated() {
        let Fixture { provider, .. } = fixture().await;
        for name in ["a", "b"] {
            provider
                .write_metric(&pods_request("pods"), ObjectCoordinate::new("default", name), 1.0, LabelSet::new())
                .await
                .unwrap();
        }
        let namespaces = MetricRequest::new(GroupResource::new("", "namespaces"), true, "qps");
        provider
            .write_metric(&namespaces, ObjectCoordinate::cluster_scoped("default"), 1.0, LabelSet::new())
            .await
            .unwrap();

        let metrics = provider.list_all_metrics().await;
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.namespaced()));
    }

    #[tokio::test]
    async fn test_external_metrics() {
        let Fixture { provider, .. } = fixture().await;

        let values = provider
            .get_external_metric("default", &Selector::parse("foo=bar").unwrap(), "my-external-metric")
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 42.0);
        assert_eq!(values[0].timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let infos = provider.list_all_external_metrics().await;
        assert_eq!(
            infos,
            vec![
                ExternalMetricInfo { metric: "my-external-metric".into() },
                ExternalMetricInfo { metric: "other-external-metric".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_provider_has_no_values() {
        let provider = crate::provider::EmptyProvider;
        let request = pods_request("pods");

        let err = provider
            .get_metric_by_name(&ObjectCoordinate::new("default", "a"), &request, &Selector::everything())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(provider
            .get_metric_by_selector("default", &Selector::everything(), &request, &Selector::everything())
            .await
            .unwrap()
            .is_empty());
        assert!(provider.list_all_metrics().await.is_empty());
        assert!(provider.list_all_external_metrics().await.is_empty());
    }
}

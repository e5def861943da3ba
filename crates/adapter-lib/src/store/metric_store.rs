//! Latest-value metric store
//!
//! A single store-wide read-write lock guards the table. Writers hold it
//! briefly; readers share it. The object lister is always called before the
//! lock is taken.

use super::ObjectLister;
use crate::error::{AdapterError, Result};
use crate::labels::{LabelSet, Selector};
use crate::models::{MetricIdentity, ObjectCoordinate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The latest value recorded for one metric on one object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub identity: MetricIdentity,
    pub coordinate: ObjectCoordinate,
    pub value: f64,
    /// The metric's own labels, not the object's
    pub labels: LabelSet,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    identity: MetricIdentity,
    coordinate: ObjectCoordinate,
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: f64,
    labels: LabelSet,
    timestamp: DateTime<Utc>,
}

type Table = HashMap<RecordKey, StoredValue>;

pub struct MetricStore {
    records: RwLock<Table>,
    lister: Arc<dyn ObjectLister>,
}

impl MetricStore {
    pub fn new(lister: Arc<dyn ObjectLister>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            lister,
        }
    }

    /// Record a value, replacing whatever the key held before
    pub async fn upsert(
        &self,
        identity: MetricIdentity,
        coordinate: ObjectCoordinate,
        value: f64,
        labels: LabelSet,
        timestamp: DateTime<Utc>,
    ) {
        debug!(metric = %identity, object = %coordinate, value, "Upserting metric value");
        let mut records = self.records.write().await;
        records.insert(
            RecordKey {
                identity,
                coordinate,
            },
            StoredValue {
                value,
                labels,
                timestamp,
            },
        );
    }

    /// Exact lookup; a label mismatch is reported as not found
    pub async fn get_by_name(
        &self,
        identity: &MetricIdentity,
        coordinate: &ObjectCoordinate,
        metric_selector: &Selector,
    ) -> Result<MetricRecord> {
        let records = self.records.read().await;
        lookup(&records, identity, coordinate, metric_selector)
    }

    /// Resolve every object the lister returns, skipping those without a
    /// matching record. Only a lister failure fails the query.
    pub async fn get_by_selector(
        &self,
        identity: &MetricIdentity,
        namespace: &str,
        object_selector: &Selector,
        metric_selector: &Selector,
    ) -> Result<Vec<MetricRecord>> {
        let names = self
            .lister
            .list_object_names(namespace, object_selector, identity)
            .await
            .map_err(|e| AdapterError::transient("object lister", &e))?;

        let records = self.records.read().await;
        let listed = names.len();
        let found: Vec<MetricRecord> = names
            .into_iter()
            .filter_map(|name| {
                let coordinate = ObjectCoordinate::new(namespace, name);
                lookup(&records, identity, &coordinate, metric_selector).ok()
            })
            .collect();

        debug!(
            metric = %identity,
            namespace = %namespace,
            listed,
            found = found.len(),
            "Resolved selector query"
        );
        Ok(found)
    }

    /// Distinct identities with at least one record, from one consistent view
    pub async fn list_known_identities(&self) -> Vec<MetricIdentity> {
        let identities: BTreeSet<MetricIdentity> = {
            let records = self.records.read().await;
            records.keys().map(|k| k.identity.clone()).collect()
        };
        identities.into_iter().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn lookup(
    records: &Table,
    identity: &MetricIdentity,
    coordinate: &ObjectCoordinate,
    metric_selector: &Selector,
) -> Result<MetricRecord> {
    let key = RecordKey {
        identity: identity.clone(),
        coordinate: coordinate.clone(),
    };

    let stored = records
        .get(&key)
        .ok_or_else(|| AdapterError::MetricNotFound {
            resource: identity.group_resource().clone(),
            metric: identity.metric().to_string(),
            object: coordinate.name.clone(),
        })?;

    if !metric_selector.matches(&stored.labels) {
        return Err(AdapterError::MetricNotFoundForSelector {
            resource: identity.group_resource().clone(),
            metric: identity.metric().to_string(),
            object: coordinate.name.clone(),
            selector: metric_selector.to_string(),
        });
    }

    Ok(MetricRecord {
        identity: key.identity,
        coordinate: key.coordinate,
        value: stored.value,
        labels: stored.labels.clone(),
        timestamp: stored.timestamp,
    })
}

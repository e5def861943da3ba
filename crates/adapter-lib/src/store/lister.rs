//! Object listers for selector queries

use super::ObjectLister;
use crate::labels::{LabelSet, Selector};
use crate::mapper::MappingCache;
use crate::models::{GroupResource, MetricIdentity};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use kube::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type ObjectKey = (GroupResource, String);

/// In-memory objects with labels, listed in insertion order
#[derive(Debug, Default)]
pub struct StaticObjectLister {
    objects: RwLock<HashMap<ObjectKey, Vec<(String, LabelSet)>>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl StaticObjectLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or relabel an object of the canonical `group_resource`
    pub fn add_object(
        &self,
        group_resource: GroupResource,
        namespace: &str,
        name: &str,
        labels: LabelSet,
    ) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let entries = objects
            .entry((group_resource, namespace.to_string()))
            .or_default();
        match entries.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = labels,
            None => entries.push((name.to_string(), labels)),
        }
    }

    pub fn set_failure(&self, message: Option<String>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = message;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectLister for StaticObjectLister {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &Selector,
        identity: &MetricIdentity,
    ) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(anyhow!(message));
        }

        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let key = (identity.group_resource().clone(), namespace.to_string());
        Ok(objects
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|(_, labels)| selector.matches(labels))
            .map(|(name, _)| name.clone())
            .collect())
    }
}

/// Lists objects through the Kubernetes API using the mapping cache to
/// resolve each identity's API resource
#[derive(Clone)]
pub struct KubeObjectLister {
    client: Client,
    cache: Arc<MappingCache>,
}

impl KubeObjectLister {
    pub fn new(client: Client, cache: Arc<MappingCache>) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl ObjectLister for KubeObjectLister {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &Selector,
        identity: &MetricIdentity,
    ) -> Result<Vec<String>> {
        let mapping = self
            .cache
            .resource_for(&identity.group_resource().with_version(""))
            .with_context(|| format!("Failed to resolve API resource for {}", identity))?;

        let resource = ApiResource {
            group: mapping.group.clone(),
            version: mapping.version.clone(),
            api_version: mapping.group_version_kind().api_version(),
            kind: mapping.kind.clone(),
            plural: mapping.resource.clone(),
        };

        // Cluster-scoped resources and an empty namespace list cluster-wide
        let api: Api<DynamicObject> = if mapping.scope.is_namespaced() && !namespace.is_empty() {
            Api::namespaced_with(self.client.clone(), namespace, &resource)
        } else {
            Api::all_with(self.client.clone(), &resource)
        };

        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }

        let list = api
            .list(&params)
            .await
            .with_context(|| format!("Failed to list {} in {:?}", mapping.group_resource(), namespace))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|object| object.metadata.name)
            .collect())
    }
}

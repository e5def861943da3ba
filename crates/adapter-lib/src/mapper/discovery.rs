//! Discovery sources
//!
//! [`StaticDiscovery`] serves an in-memory, replaceable resource list.
//! [`KubeDiscovery`] runs API discovery against a Kubernetes cluster.

use super::{DiscoveredResource, DiscoverySource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::discovery::{Discovery, Scope as KubeScope};
use kube::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// In-memory discovery source whose contents can be swapped at runtime
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    resources: RwLock<Vec<DiscoveredResource>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self {
            resources: RwLock::new(resources),
            ..Default::default()
        }
    }

    /// Replace the reported resources; visible on the next regeneration
    pub fn set_resources(&self, resources: Vec<DiscoveredResource>) {
        *self.resources.write().unwrap_or_else(PoisonError::into_inner) = resources;
    }

    pub fn add_resource(&self, resource: DiscoveredResource) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    /// Make every subsequent listing fail with `message` (or succeed again with `None`)
    pub fn set_failure(&self, message: Option<String>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = message;
    }

    /// Number of listings served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    async fn list_resource_kinds(&self) -> Result<Vec<DiscoveredResource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(anyhow!(message));
        }
        Ok(self
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Discovery against the Kubernetes API, reporting each resource's
/// recommended version
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscoverySource for KubeDiscovery {
    async fn list_resource_kinds(&self) -> Result<Vec<DiscoveredResource>> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .context("Failed to run API discovery")?;

        let mut resources = Vec::new();
        for group in discovery.groups() {
            for (resource, capabilities) in group.recommended_resources() {
                // The API server defaults a missing singular name to the lowercased kind
                let singular = resource.kind.to_ascii_lowercase();
                resources.push(
                    DiscoveredResource::new(
                        resource.group,
                        resource.version,
                        resource.plural,
                        matches!(capabilities.scope, KubeScope::Namespaced),
                        resource.kind,
                    )
                    .with_singular(singular),
                );
            }
        }

        debug!(count = resources.len(), "Listed resources from API discovery");
        Ok(resources)
    }
}

//! Resource ↔ kind mapping backed by API discovery
//!
//! This module provides:
//! - Immutable mapping snapshots built from discovery results
//! - A cache that regenerates and atomically publishes snapshots
//! - A timer-driven regeneration scheduler
//! - Discovery sources (in-memory and Kubernetes API) and a singularizer

mod cache;
mod discovery;
mod pluralizer;
mod scheduler;
mod snapshot;


pub use cache::{MappingCache, MappingCacheBuilder};
pub use discovery::{KubeDiscovery, StaticDiscovery};
pub use pluralizer::SuffixPluralizer;
pub use scheduler::{RegenerationScheduler, DEFAULT_DISCOVERY_INTERVAL};
pub use snapshot::{ResourceKindMapping, Snapshot};

use crate::error::AdapterError;
use crate::observability::AdapterMetrics;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use async_trait::async_trait;

/// One resource as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `pods`
    pub resource: String,
    pub namespaced: bool,
    pub kind: String,
    /// Singular name when discovery reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular: Option<String>,
}

impl DiscoveredResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
        namespaced: bool,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
            namespaced,
            kind: kind.into(),
            singular: None,
        }
    }

    pub fn with_singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self
    }
}

/// Source of the full set of served resource kinds
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// List every resource of every served group-version
    async fn list_resource_kinds(&self) -> Result<Vec<DiscoveredResource>>;
}

/// Maps a plural resource name to its singular form
pub trait Pluralizer: Send + Sync {
    fn singularize(&self, plural: &str) -> String;
}

/// Receives regeneration failures that are not raised further
pub trait ErrorSink: Send + Sync {
    fn report(&self, err: &AdapterError);
}

/// Logs failures and counts them in the adapter metrics
#[derive(Clone, Default)]
pub struct TracingErrorSink {
    metrics: AdapterMetrics,
}

impl TracingErrorSink {
    pub fn new(metrics: AdapterMetrics) -> Self {
        Self { metrics }
    }
}

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &AdapterError) {
        self.metrics.inc_regeneration_errors();
        tracing::warn!(
            error = %err,
            class = err.class().as_str(),
            "Resource mapping regeneration failed, keeping previous snapshot"
        );
    }
}

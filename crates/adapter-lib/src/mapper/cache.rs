//! Regenerating mapping cache
//!
//! Holds the published [`Snapshot`] behind an atomically swappable pointer.
//! Regeneration builds a new snapshot off the query path and swaps it in;
//! readers never wait on it and never see a half-built table.

use super::{
    DiscoverySource, ErrorSink, Pluralizer, ResourceKindMapping, Snapshot, SuffixPluralizer,
    TracingErrorSink,
};
use crate::error::{AdapterError, Result};
use crate::models::{GroupKind, GroupResource, GroupVersionKind, GroupVersionResource};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Cache of resource ↔ kind mappings fed by a discovery source
pub struct MappingCache {
    discovery: Arc<dyn DiscoverySource>,
    pluralizer: Arc<dyn Pluralizer>,
    error_sink: Arc<dyn ErrorSink>,
    preferred_groups: Vec<String>,
    current: ArcSwap<Snapshot>,
    /// Held for the whole of a regeneration; stores the last outcome
    in_flight: Mutex<Option<Result<u64>>>,
    /// Number of completed regeneration attempts
    attempts: AtomicU64,
}

impl MappingCache {
    pub fn builder(discovery: Arc<dyn DiscoverySource>) -> MappingCacheBuilder {
        MappingCacheBuilder::new(discovery)
    }

    /// Create a cache with default collaborators and no group preference
    pub fn new(discovery: Arc<dyn DiscoverySource>) -> Self {
        Self::builder(discovery).build()
    }

    /// Fetch discovery and publish a freshly built snapshot.
    ///
    /// Returns the generation of the published snapshot. Failures keep the
    /// previous snapshot, go to the error sink and are returned as values.
    /// Callers arriving while a regeneration runs wait for it and share its
    /// outcome instead of fetching again.
    pub async fn regenerate(&self) -> Result<u64> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut last = self.in_flight.lock().await;

        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                debug!("Joined a regeneration that completed while waiting");
                return outcome.clone();
            }
        }

        let outcome = self.run_regeneration().await;
        *last = Some(outcome.clone());
        self.attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn run_regeneration(&self) -> Result<u64> {
        let start = Instant::now();

        let resources = match self.discovery.list_resource_kinds().await {
            Ok(resources) => resources,
            Err(e) => {
                let err = AdapterError::transient("discovery", &e);
                self.error_sink.report(&err);
                return Err(err);
            }
        };

        let generation = self.current.load().generation() + 1;
        let snapshot = Snapshot::build(generation, resources, self.pluralizer.as_ref());
        let count = snapshot.len();
        self.current.store(Arc::new(snapshot));

        info!(
            generation,
            resources = count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Published resource mapping snapshot"
        );
        Ok(generation)
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Generation of the published snapshot, 0 before the first success
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Groups that break ties between same-named resources, in order
    pub fn preferred_groups(&self) -> &[String] {
        &self.preferred_groups
    }

    /// Number of regeneration attempts completed so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Kind served by a possibly partial resource reference
    pub fn kind_for(&self, resource: &GroupVersionResource) -> Result<GroupVersionKind> {
        self.current.load().kind_for(resource, &self.preferred_groups)
    }

    /// Resolve a plural or singular, possibly unqualified, resource name
    pub fn resource_for(&self, partial: &GroupVersionResource) -> Result<ResourceKindMapping> {
        self.current
            .load()
            .resource_for(partial, &self.preferred_groups)
            .cloned()
    }

    /// Reverse lookup from a group-kind to its resource
    pub fn resource_for_kind(&self, group_kind: &GroupKind) -> Result<ResourceKindMapping> {
        self.current.load().resource_for_kind(group_kind).cloned()
    }

    /// Singular name of a canonical plural group-resource
    pub fn resource_singularizer(&self, group_resource: &GroupResource) -> Result<String> {
        self.current
            .load()
            .singular_for(group_resource)
            .map(str::to_string)
    }
}

/// Builder for [`MappingCache`]
pub struct MappingCacheBuilder {
    discovery: Arc<dyn DiscoverySource>,
    pluralizer: Arc<dyn Pluralizer>,
    error_sink: Arc<dyn ErrorSink>,
    preferred_groups: Vec<String>,
}

impl MappingCacheBuilder {
    pub fn new(discovery: Arc<dyn DiscoverySource>) -> Self {
        Self {
            discovery,
            pluralizer: Arc::new(SuffixPluralizer::default()),
            error_sink: Arc::new(TracingErrorSink::default()),
            preferred_groups: Vec::new(),
        }
    }

    pub fn pluralizer(mut self, pluralizer: Arc<dyn Pluralizer>) -> Self {
        self.pluralizer = pluralizer;
        self
    }

    pub fn error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    /// Groups that win, in order, when an unqualified resource matches several groups.
    /// The core group is the empty string.
    pub fn preferred_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> MappingCache {
        MappingCache {
            discovery: self.discovery,
            pluralizer: self.pluralizer,
            error_sink: self.error_sink,
            preferred_groups: self.preferred_groups,
            current: ArcSwap::from_pointee(Snapshot::empty()),
            in_flight: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }
}

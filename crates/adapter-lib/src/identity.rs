//! Metric identity normalization
//!
//! Resolves caller-spelled resource names (plural, singular, any case,
//! group optional) to the canonical plural group-resource so identities can
//! be compared and used as storage keys.

use crate::error::Result;
use crate::mapper::MappingCache;
use crate::models::{MetricIdentity, MetricRequest, Scope};
use std::sync::Arc;
use tracing::debug;

/// A normalized identity plus what the lookup learned about the resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub identity: MetricIdentity,
    /// Singular form of the canonical resource name
    pub singular: String,
    pub scope: Scope,
}

pub struct IdentityNormalizer {
    cache: Arc<MappingCache>,
    retry_on_miss: bool,
}

impl IdentityNormalizer {
    /// Create a normalizer that regenerates once on an unknown resource
    pub fn new(cache: Arc<MappingCache>) -> Self {
        Self {
            cache,
            retry_on_miss: true,
        }
    }

    pub fn with_retry_on_miss(mut self, retry_on_miss: bool) -> Self {
        self.retry_on_miss = retry_on_miss;
        self
    }

    pub fn cache(&self) -> &Arc<MappingCache> {
        &self.cache
    }

    /// Normalize against the current snapshot only
    pub fn normalize_cached(&self, request: &MetricRequest) -> Result<NormalizedIdentity> {
        // One snapshot for both lookups so they cannot straddle a publish
        let snapshot = self.cache.snapshot();
        let partial = request.group_resource.with_version("");
        let mapping = snapshot.resource_for(&partial, self.cache.preferred_groups())?;
        let group_resource = mapping.group_resource();
        let singular = snapshot.singular_for(&group_resource)?.to_string();

        Ok(NormalizedIdentity {
            identity: MetricIdentity::new(group_resource, request.namespaced, request.metric.clone()),
            singular,
            scope: mapping.scope,
        })
    }

    /// Normalize, forcing one regeneration and a single retry when the
    /// resource is unknown (e.g. a freshly installed custom resource).
    pub async fn normalize(&self, request: &MetricRequest) -> Result<NormalizedIdentity> {
        match self.normalize_cached(request) {
            Err(e) if e.is_not_found() && self.retry_on_miss => {
                debug!(
                    resource = %request.group_resource,
                    "Resource not in mapping snapshot, regenerating before retry"
                );
                self.cache.regenerate().await?;
                self.normalize_cached(request)
            }
            outcome => outcome,
        }
    }
}

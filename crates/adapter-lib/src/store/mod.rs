//! In-memory metric value storage
//!
//! This module provides:
//! - A concurrent store of the latest value per (identity, object)
//! - Exact-name and selector-based resolution with partial coverage
//! - Object listers (in-memory and Kubernetes API) feeding selector queries

mod lister;
mod metric_store;

#[cfg(test)]
mod tests;

pub use lister::{KubeObjectLister, StaticObjectLister};
pub use metric_store::{MetricRecord, MetricStore};

use crate::labels::Selector;
use crate::models::MetricIdentity;
use anyhow::Result;

pub use async_trait::async_trait;

/// Enumerates the objects a selector query covers
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Names of the objects of `identity`'s resource in `namespace` whose
    /// labels match `selector`, in a stable order
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &Selector,
        identity: &MetricIdentity,
    ) -> Result<Vec<String>>;
}

//! Core data models for the metrics adapter

use serde::{Deserialize, Serialize};
use std::fmt;

/// An API group and resource name, independent of version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Parse `resource` or `resource.group` (the group may itself contain dots)
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((resource, group)) => Self::new(group, resource),
            None => Self::new("", raw),
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> GroupVersionResource {
        GroupVersionResource {
            group: self.group.clone(),
            version: version.into(),
            resource: self.resource.clone(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// A possibly partial resource reference; empty fields are wildcards
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }
}

/// An API group and kind, independent of version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    /// `v1` for the core group, `group/version` otherwise
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Whether a resource type lives inside namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    pub fn from_namespaced(namespaced: bool) -> Self {
        if namespaced {
            Scope::Namespaced
        } else {
            Scope::Cluster
        }
    }

    pub fn is_namespaced(self) -> bool {
        self == Scope::Namespaced
    }
}

/// Location of a single object; the namespace is empty for cluster-scoped objects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectCoordinate {
    pub namespace: String,
    pub name: String,
}

impl ObjectCoordinate {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new("", name)
    }
}

impl fmt::Display for ObjectCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Caller-spelled metric request, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricRequest {
    pub group_resource: GroupResource,
    pub namespaced: bool,
    pub metric: String,
}

impl MetricRequest {
    pub fn new(group_resource: GroupResource, namespaced: bool, metric: impl Into<String>) -> Self {
        Self {
            group_resource,
            namespaced,
            metric: metric.into(),
        }
    }
}

/// Canonical metric identity: plural group-resource, scope flag and metric name.
///
/// Only the identity normalizer produces these, so two identities compare
/// equal exactly when they name the same metric on the same resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricIdentity {
    group_resource: GroupResource,
    namespaced: bool,
    metric: String,
}

impl MetricIdentity {
    pub(crate) fn new(group_resource: GroupResource, namespaced: bool, metric: String) -> Self {
        Self {
            group_resource,
            namespaced,
            metric,
        }
    }

    pub fn group_resource(&self) -> &GroupResource {
        &self.group_resource
    }

    pub fn namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Back to a request, e.g. to feed it through the normalizer again
    pub fn to_request(&self) -> MetricRequest {
        MetricRequest::new(self.group_resource.clone(), self.namespaced, self.metric.clone())
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespaced {
            write!(f, "{}/{}(namespaced)", self.group_resource, self.metric)
        } else {
            write!(f, "{}/{}", self.group_resource, self.metric)
        }
    }
}

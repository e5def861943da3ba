//! Immutable resource mapping tables

use super::{DiscoveredResource, Pluralizer};
use crate::error::{AdapterError, Result};
use crate::models::{GroupKind, GroupResource, GroupVersionKind, GroupVersionResource, Scope};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Everything known about one group-resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKindMapping {
    pub group: String,
    /// Preferred (first reported) version
    pub version: String,
    /// All versions the resource was reported under, preferred first
    pub versions: Vec<String>,
    /// Plural resource name
    pub resource: String,
    pub singular: String,
    pub kind: String,
    pub scope: Scope,
}

impl ResourceKindMapping {
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.clone(), self.kind.clone())
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
        }
    }

    fn serves_version(&self, version: &str) -> bool {
        version.is_empty() || self.versions.iter().any(|v| v == version)
    }
}

/// A fully built mapping table; never mutated after construction
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    mappings: HashMap<GroupResource, ResourceKindMapping>,
    /// Plural names and published singular aliases → group-resources using them
    by_name: HashMap<String, Vec<GroupResource>>,
    by_kind: HashMap<GroupKind, GroupResource>,
}

impl Snapshot {
    /// The snapshot published before the first regeneration
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(
        generation: u64,
        resources: Vec<DiscoveredResource>,
        pluralizer: &dyn Pluralizer,
    ) -> Self {
        let mut mappings: HashMap<GroupResource, ResourceKindMapping> = HashMap::new();
        let mut by_kind: HashMap<GroupKind, GroupResource> = HashMap::new();

        for discovered in resources {
            let plural = discovered.resource.to_ascii_lowercase();
            if plural.is_empty() || plural.contains('/') {
                debug!(resource = %discovered.resource, "Skipping subresource");
                continue;
            }

            let group_resource = GroupResource::new(discovered.group.clone(), plural.clone());
            let scope = Scope::from_namespaced(discovered.namespaced);

            if let Some(existing) = mappings.get_mut(&group_resource) {
                if existing.kind != discovered.kind || existing.scope != scope {
                    warn!(
                        resource = %group_resource,
                        version = %discovered.version,
                        kind = %discovered.kind,
                        existing_kind = %existing.kind,
                        "Conflicting kind or scope for resource, keeping the preferred version"
                    );
                } else if !existing.versions.contains(&discovered.version) {
                    existing.versions.push(discovered.version);
                }
                continue;
            }

            // Discovery's singular, then the lowercased kind, then suffix rules
            let singular = discovered
                .singular
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| Some(discovered.kind.as_str()).filter(|k| !k.is_empty()))
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| pluralizer.singularize(&plural));

            let group_kind = GroupKind::new(discovered.group.clone(), discovered.kind.clone());
            match by_kind.get(&group_kind) {
                Some(owner) => warn!(
                    kind = %discovered.kind,
                    resource = %group_resource,
                    owner = %owner,
                    "Kind already served by another resource"
                ),
                None => {
                    by_kind.insert(group_kind, group_resource.clone());
                }
            }

            mappings.insert(
                group_resource,
                ResourceKindMapping {
                    group: discovered.group,
                    version: discovered.version.clone(),
                    versions: vec![discovered.version],
                    resource: plural,
                    singular,
                    kind: discovered.kind,
                    scope,
                },
            );
        }

        let by_name = index_names(&mappings);

        Self {
            generation,
            mappings,
            by_name,
            by_kind,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn mappings(&self) -> impl Iterator<Item = &ResourceKindMapping> {
        self.mappings.values()
    }

    pub fn get(&self, group_resource: &GroupResource) -> Option<&ResourceKindMapping> {
        self.mappings.get(group_resource)
    }

    /// Resolve a possibly partial, possibly singular resource reference.
    ///
    /// An empty group matches every group and an empty version every version.
    /// When several groups match, the first group of `preferred_groups` that
    /// has a candidate wins; without one the lookup is ambiguous.
    pub fn resource_for(
        &self,
        partial: &GroupVersionResource,
        preferred_groups: &[String],
    ) -> Result<&ResourceKindMapping> {
        let name = partial.resource.to_ascii_lowercase();
        let candidates: Vec<&ResourceKindMapping> = self
            .by_name
            .get(&name)
            .into_iter()
            .flatten()
            .filter(|gr| partial.group.is_empty() || gr.group == partial.group)
            .filter_map(|gr| self.mappings.get(gr))
            .filter(|m| m.serves_version(&partial.version))
            .collect();

        match candidates.as_slice() {
            [] => Err(AdapterError::ResourceNotFound(partial.group_resource())),
            [only] => Ok(*only),
            _ => preferred_groups
                .iter()
                .find_map(|group| candidates.iter().find(|m| &m.group == group).copied())
                .ok_or_else(|| {
                    let mut names: Vec<String> = candidates
                        .iter()
                        .map(|m| m.group_resource().to_string())
                        .collect();
                    names.sort();
                    AdapterError::Ambiguous {
                        resource: partial.group_resource().to_string(),
                        candidates: names,
                    }
                }),
        }
    }

    /// Kind for a resource; an explicit version is carried into the result
    pub fn kind_for(
        &self,
        partial: &GroupVersionResource,
        preferred_groups: &[String],
    ) -> Result<GroupVersionKind> {
        let mapping = self.resource_for(partial, preferred_groups)?;
        let mut gvk = mapping.group_version_kind();
        if !partial.version.is_empty() {
            gvk.version = partial.version.clone();
        }
        Ok(gvk)
    }

    pub fn resource_for_kind(&self, group_kind: &GroupKind) -> Result<&ResourceKindMapping> {
        self.by_kind
            .get(group_kind)
            .and_then(|gr| self.mappings.get(gr))
            .ok_or_else(|| AdapterError::KindNotFound {
                group: group_kind.group.clone(),
                kind: group_kind.kind.clone(),
            })
    }

    pub fn singular_for(&self, group_resource: &GroupResource) -> Result<&str> {
        self.mappings
            .get(group_resource)
            .map(|m| m.singular.as_str())
            .ok_or_else(|| AdapterError::ResourceNotFound(group_resource.clone()))
    }
}

/// Index plural names and those singular aliases that are unique in their group
fn index_names(
    mappings: &HashMap<GroupResource, ResourceKindMapping>,
) -> HashMap<String, Vec<GroupResource>> {
    let mut by_name: HashMap<String, Vec<GroupResource>> = HashMap::new();
    for gr in mappings.keys() {
        by_name.entry(gr.resource.clone()).or_default().push(gr.clone());
    }

    let mut aliases: HashMap<(String, String), Vec<GroupResource>> = HashMap::new();
    for (gr, mapping) in mappings {
        if mapping.singular != mapping.resource {
            aliases
                .entry((gr.group.clone(), mapping.singular.clone()))
                .or_default()
                .push(gr.clone());
        }
    }

    for ((group, singular), owners) in aliases {
        let shadows_plural = mappings.contains_key(&GroupResource::new(group.clone(), singular.clone()));
        if owners.len() > 1 || shadows_plural {
            warn!(
                group = %group,
                singular = %singular,
                owners = owners.len(),
                "Singular name is not unique in its group, withholding alias"
            );
            continue;
        }
        by_name.entry(singular).or_default().extend(owners);
    }

    for owners in by_name.values_mut() {
        owners.sort();
    }
    by_name
}

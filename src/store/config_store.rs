use std::collections::BTreeMap;
use std::collections::HashMap;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;

use crate::constants::MAX_RESOURCE_NAME_LEN;
use crate::Resource;
use crate::ResourceKey;
use crate::ResourceSet;
use crate::StoreError;

#[derive(Debug, Default)]
struct NodeResources {
    resources: BTreeMap<ResourceKey, Resource>,
    /// Last version handed out per key. Survives deletes so a re-inserted
    /// key never reuses a version.
    high_water: HashMap<ResourceKey, u64>,
}

/// Per-node desired resources with per-key monotonic versioning.
#[derive(Debug, Default)]
pub struct ConfigStore {
    nodes: DashMap<String, NodeResources>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts one resource and returns its version.
    ///
    /// A new payload gets the next version for its key. Re-putting a
    /// byte-identical payload keeps the existing version.
    pub fn put(
        &self,
        node_id: &str,
        type_url: &str,
        name: &str,
        payload: Bytes,
    ) -> std::result::Result<u64, StoreError> {
        validate_identifiers(node_id, type_url, name)?;

        let key = ResourceKey::new(type_url, name);
        let mut node = self.nodes.entry(node_id.to_string()).or_default();

        if let Some(existing) = node.resources.get(&key) {
            if existing.payload() == &payload {
                return Ok(existing.version());
            }
        }

        let version = node.high_water.get(&key).copied().unwrap_or(0) + 1;
        node.high_water.insert(key.clone(), version);
        node.resources.insert(key, Resource::new(payload, version));

        trace!(node_id, type_url, name, version, "Resource stored");
        Ok(version)
    }

    /// Removes one resource. Returns whether it existed.
    pub fn delete(
        &self,
        node_id: &str,
        type_url: &str,
        name: &str,
    ) -> std::result::Result<bool, StoreError> {
        validate_identifiers(node_id, type_url, name)?;

        let removed = self
            .nodes
            .get_mut(node_id)
            .map(|mut node| node.resources.remove(&ResourceKey::new(type_url, name)).is_some())
            .unwrap_or(false);

        if removed {
            trace!(node_id, type_url, name, "Resource deleted");
        }
        Ok(removed)
    }

    /// Immutable copy of the node's current resources.
    ///
    /// Unknown nodes yield an empty set.
    pub fn snapshot(
        &self,
        node_id: &str,
    ) -> ResourceSet {
        self.nodes
            .get(node_id)
            .map(|node| ResourceSet::new(node.resources.clone()))
            .unwrap_or_default()
    }

    /// Names of one type currently stored for a node.
    pub fn names_of_type(
        &self,
        node_id: &str,
        type_url: &str,
    ) -> Vec<String> {
        self.nodes
            .get(node_id)
            .map(|node| {
                node.resources
                    .keys()
                    .filter(|k| k.type_url() == type_url)
                    .map(|k| k.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

/// Rejects empty identifiers and names outside `[A-Za-z0-9._-]`.
pub fn validate_resource_name(name: &str) -> std::result::Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidResourceName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("only ASCII letters, digits, '.', '_' and '-' are allowed"));
    }
    Ok(())
}

fn validate_identifiers(
    node_id: &str,
    type_url: &str,
    name: &str,
) -> std::result::Result<(), StoreError> {
    if node_id.is_empty() {
        return Err(StoreError::EmptyNodeId);
    }
    if type_url.is_empty() {
        return Err(StoreError::EmptyTypeUrl);
    }
    validate_resource_name(name)
}

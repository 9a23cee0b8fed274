use std::collections::BTreeMap;
use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use super::Snapshot;
use crate::constants::REQUIRED_RESOURCE_TYPES;
use crate::ResourceSet;
use crate::SnapshotError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TypeRevision {
    counter: u64,
    digest: Vec<(String, u64)>,
}

/// Counter state for one node.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct NodeCounters {
    sequence: u64,
    types: HashMap<String, TypeRevision>,
}

/// Turns a node's [`ResourceSet`] into a versioned [`Snapshot`].
///
/// Versions come from per-node counters, never from the wall clock, so two
/// builds within the same instant still get distinct outer versions.
/// A type's version only advances when that type's content changes.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    nodes: DashMap<String, NodeCounters>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &self,
        node_id: &str,
        resources: &ResourceSet,
    ) -> std::result::Result<Snapshot, SnapshotError> {
        // closure check first, a rejected build must not consume a sequence
        if let Some((key, _)) = resources
            .iter()
            .find(|(key, _)| !REQUIRED_RESOURCE_TYPES.iter().any(|t| *t == key.type_url()))
        {
            return Err(SnapshotError::UnknownResourceType {
                type_url: key.type_url().to_string(),
                name: key.name().to_string(),
            });
        }

        let mut counters = self.nodes.entry(node_id.to_string()).or_default();
        counters.sequence += 1;

        let mut type_versions = BTreeMap::new();
        for type_url in REQUIRED_RESOURCE_TYPES {
            let digest = resources.type_digest(type_url);
            let revision = counters.types.entry(type_url.to_string()).or_default();
            if revision.counter == 0 || revision.digest != digest {
                revision.counter += 1;
                revision.digest = digest;
            }
            type_versions.insert(type_url.to_string(), revision.counter.to_string());
        }

        let snapshot = Snapshot::new(
            node_id.to_string(),
            counters.sequence,
            type_versions,
            resources.clone(),
        );

        debug!(
            node_id,
            version = snapshot.version(),
            resources = resources.len(),
            "Snapshot built"
        );
        Ok(snapshot)
    }

    /// Last outer sequence produced for a node (0 if none).
    pub fn last_sequence(
        &self,
        node_id: &str,
    ) -> u64 {
        self.nodes.get(node_id).map(|c| c.sequence).unwrap_or(0)
    }
}

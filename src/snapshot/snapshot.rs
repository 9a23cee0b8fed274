use std::collections::BTreeMap;

use crate::constants::REQUIRED_RESOURCE_TYPES;
use crate::constants::SNAPSHOT_VERSION_PREFIX;
use crate::Resource;
use crate::ResourceKey;
use crate::ResourceSet;

/// Internally consistent bundle of resources for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    node_id: String,
    /// Outer version, e.g. `snapshot-42`
    version: String,
    /// Strictly increasing per node; 0 only for the empty initial snapshot
    sequence: u64,
    /// Version per carried resource type
    type_versions: BTreeMap<String, String>,
    resources: ResourceSet,
}

impl Snapshot {
    pub(crate) fn new(
        node_id: String,
        sequence: u64,
        type_versions: BTreeMap<String, String>,
        resources: ResourceSet,
    ) -> Self {
        Self {
            node_id,
            version: format!("{SNAPSHOT_VERSION_PREFIX}{sequence}"),
            sequence,
            type_versions,
            resources,
        }
    }

    /// What a node sees before any operator has configured it: every carried
    /// type is present, empty and unversioned.
    pub fn empty(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            version: String::new(),
            sequence: 0,
            type_versions: REQUIRED_RESOURCE_TYPES
                .iter()
                .map(|t| (t.to_string(), String::new()))
                .collect(),
            resources: ResourceSet::default(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_initial(&self) -> bool {
        self.sequence == 0
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn type_urls(&self) -> impl Iterator<Item = &str> {
        self.type_versions.keys().map(String::as_str)
    }

    /// `None` when the type is not carried by this snapshot.
    pub fn type_version(
        &self,
        type_url: &str,
    ) -> Option<&str> {
        self.type_versions.get(type_url).map(String::as_str)
    }

    pub fn carries(
        &self,
        type_url: &str,
    ) -> bool {
        self.type_versions.contains_key(type_url)
    }

    /// Resources of one type matching `names`; an empty filter matches all.
    pub fn resources_of<'a>(
        &'a self,
        type_url: &'a str,
        names: &'a [String],
    ) -> impl Iterator<Item = (&'a ResourceKey, &'a Resource)> + 'a {
        self.resources
            .of_type(type_url)
            .filter(move |(key, _)| names.is_empty() || names.iter().any(|n| n == key.name()))
    }

    /// Every resource belongs to a carried type and every required type is
    /// carried.
    pub fn is_closed(&self) -> bool {
        REQUIRED_RESOURCE_TYPES.iter().all(|t| self.carries(t))
            && self.resources.iter().all(|(key, _)| self.carries(key.type_url()))
    }
}

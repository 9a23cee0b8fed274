use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;

/// `(resource type, resource name)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    type_url: String,
    name: String,
}

impl ResourceKey {
    pub fn new(
        type_url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            type_url: type_url.into(),
            name: name.into(),
        }
    }

    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.type_url, self.name)
    }
}

/// Opaque payload stamped with its store revision.
///
/// The payload is never mutated once a version is assigned; a new payload
/// always comes with a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    payload: Bytes,
    version: u64,
}

impl Resource {
    pub fn new(
        payload: Bytes,
        version: u64,
    ) -> Self {
        Self { payload, version }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Immutable mapping from [`ResourceKey`] to [`Resource`].
///
/// Cloning is cheap: the entries live behind an `Arc` and are never mutated
/// after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    entries: Arc<BTreeMap<ResourceKey, Resource>>,
}

impl ResourceSet {
    pub fn new(entries: BTreeMap<ResourceKey, Resource>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(
        &self,
        key: &ResourceKey,
    ) -> Option<&Resource> {
        self.entries.get(key)
    }

    pub fn lookup(
        &self,
        type_url: &str,
        name: &str,
    ) -> Option<&Resource> {
        self.entries.get(&ResourceKey::new(type_url, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &Resource)> {
        self.entries.iter()
    }

    /// All resources of one type, ordered by name.
    pub fn of_type<'a>(
        &'a self,
        type_url: &'a str,
    ) -> impl Iterator<Item = (&'a ResourceKey, &'a Resource)> + 'a {
        let start = ResourceKey::new(type_url, "");
        self.entries
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(key, _)| key.type_url() == type_url)
    }

    /// Distinct resource types present in this set.
    pub fn type_urls(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|k| k.type_url()).collect();
        types.dedup();
        types
    }

    /// `(name, version)` pairs of one type; two sets with equal digests for a
    /// type carry identical content for that type.
    pub fn type_digest(
        &self,
        type_url: &str,
    ) -> Vec<(String, u64)> {
        self.of_type(type_url)
            .map(|(key, resource)| (key.name().to_string(), resource.version()))
            .collect()
    }
}

impl FromIterator<(ResourceKey, Resource)> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = (ResourceKey, Resource)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

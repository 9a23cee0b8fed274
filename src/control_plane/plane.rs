use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;
use tracing::warn;

use super::runtime_values;
use super::ConfigPublisher;
use super::PublishReceipt;
use super::ShardConfig;
use crate::constants::TENANT_OVERRIDE_TYPE;
use crate::metrics::PUBLISH_FAILURES;
use crate::metrics::PUBLISH_LATENCY_METRIC;
use crate::metrics::SNAPSHOTS_PUBLISHED;
use crate::ConfigStore;
use crate::Error;
use crate::Result;
use crate::Snapshot;
use crate::SnapshotBuilder;
use crate::SnapshotCache;
use crate::StoreError;

/// Owns the store, the builder and the cache, and wires operator publishes
/// through them.
#[derive(Debug)]
pub struct ControlPlane {
    store: ConfigStore,
    builder: SnapshotBuilder,
    cache: Arc<SnapshotCache>,
    /// Serializes store write → build → swap per node
    publish_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new(Arc::new(SnapshotCache::new()))
    }
}

impl ControlPlane {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self {
            store: ConfigStore::new(),
            builder: SnapshotBuilder::new(),
            cache,
            publish_locks: DashMap::new(),
        }
    }

    /// Cache shared with the discovery server.
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// `resource name → value` view of the node's current snapshot.
    pub fn runtime_values(
        &self,
        node_id: &str,
    ) -> BTreeMap<String, i64> {
        runtime_values(&self.cache.snapshot(node_id))
    }

    fn publish_lock(
        &self,
        node_id: &str,
    ) -> Arc<Mutex<()>> {
        self.publish_locks.entry(node_id.to_string()).or_default().clone()
    }

    fn apply(
        &self,
        node_id: &str,
        config: &ShardConfig,
    ) -> Result<PublishReceipt> {
        if node_id.is_empty() {
            return Err(StoreError::EmptyNodeId.into());
        }
        let entries = config.entries()?;

        let lock = self.publish_lock(node_id);
        let _guard = lock.lock();

        let mut wanted_tenants = HashSet::with_capacity(config.tenants.len());
        for entry in &entries {
            self.store.put(node_id, entry.type_url, &entry.name, entry.payload())?;
            if entry.type_url == TENANT_OVERRIDE_TYPE {
                wanted_tenants.insert(entry.name.as_str());
            }
        }

        for name in self.store.names_of_type(node_id, TENANT_OVERRIDE_TYPE) {
            if !wanted_tenants.contains(name.as_str()) {
                self.store.delete(node_id, TENANT_OVERRIDE_TYPE, &name)?;
                info!(node_id, tenant = %name, "Tenant override removed");
            }
        }

        let snapshot = Arc::new(self.builder.build(node_id, &self.store.snapshot(node_id))?);
        let receipt = PublishReceipt {
            snapshot_version: snapshot.version().to_string(),
            sequence: snapshot.sequence(),
        };
        self.cache.set_snapshot(node_id, snapshot)?;

        Ok(receipt)
    }
}

impl ConfigPublisher for ControlPlane {
    fn publish_config(
        &self,
        node_id: &str,
        config: &ShardConfig,
    ) -> Result<PublishReceipt> {
        let started = Instant::now();

        match self.apply(node_id, config) {
            Ok(receipt) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                SNAPSHOTS_PUBLISHED.with_label_values(&[node_id]).inc();
                PUBLISH_LATENCY_METRIC.with_label_values(&[node_id]).observe(elapsed_ms);
                info!(
                    node_id,
                    version = %receipt.snapshot_version,
                    total_hosts = config.total_hosts,
                    default_shard_size = config.default_shard_size,
                    tenants = config.tenants.len(),
                    "Configuration published"
                );
                Ok(receipt)
            }
            Err(e) => {
                PUBLISH_FAILURES.with_label_values(&[failure_reason(&e)]).inc();
                warn!(node_id, "Publish rejected: {}", e);
                Err(e)
            }
        }
    }

    fn current_snapshot(
        &self,
        node_id: &str,
    ) -> Arc<Snapshot> {
        self.cache.snapshot(node_id)
    }
}

fn failure_reason(e: &Error) -> &'static str {
    match e {
        Error::Publish(_) => "invalid_config",
        Error::Store(_) => "invalid_resource",
        Error::Snapshot(_) => "snapshot",
        Error::Cache(_) => "stale_snapshot",
        _ => "internal",
    }
}

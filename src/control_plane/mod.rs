//! Operator-facing facade over the distribution engine.
//!
//! A publish runs the whole pipeline for one node under that node's publish
//! lock:
//!
//! ```text
//! validate ─> ConfigStore::put/delete ─> SnapshotBuilder::build ─> SnapshotCache::set_snapshot
//! ```
//!
//! Validation happens before the first store write, so a rejected publish
//! leaves no trace.

mod plane;
mod shard_config;
pub use plane::*;
pub use shard_config::*;


use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Result;
use crate::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub snapshot_version: String,
    pub sequence: u64,
}

#[cfg_attr(test, automock)]
pub trait ConfigPublisher: Send + Sync + 'static {
    /// Replaces the node's shard configuration and installs a new snapshot.
    ///
    /// # Errors
    /// - `Error::Publish` for negative counts or unusable tenant names
    /// - `Error::Store` for an invalid node id
    /// - `Error::Snapshot` / `Error::Cache` if the snapshot cannot be installed
    fn publish_config(
        &self,
        node_id: &str,
        config: &ShardConfig,
    ) -> Result<PublishReceipt>;

    /// Snapshot nodes bound to `node_id` currently converge on.
    fn current_snapshot(
        &self,
        node_id: &str,
    ) -> Arc<Snapshot>;
}

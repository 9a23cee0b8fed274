//! Process-wide snapshot cache
//!
//! Maps node identifiers to their current [`Snapshot`](crate::Snapshot) and
//! notifies bound subscribers whenever it is replaced.
//!
//! # Architecture
//!
//! ```text
//! Operator path:
//!   ControlPlane::publish_config() -> SnapshotCache::set_snapshot()
//!                                         │  node lock held:
//!                                         │    ArcSwap::store(new)
//!                                         │    watch::Sender::send() per subscriber
//!                                         ▼
//! Session task:
//!   SnapshotSubscription::changed() -> DiscoverySession::on_snapshot() -> stream write
//! ```
//!
//! # Consistency
//!
//! - Every node owns its own lock; unrelated nodes never contend.
//! - Readers load the current snapshot through `ArcSwap`: they see either the
//!   old or the new snapshot in full.
//! - Notification never blocks: `watch` channels keep only the latest
//!   snapshot, so a slow session skips intermediate revisions.
//! - A snapshot that does not advance the node's sequence is rejected, so the
//!   versions a subscriber observes never go backwards.
//!
//! # Cleanup
//!
//! Dropping a [`SnapshotSubscription`] deregisters it. Sending to a
//! subscriber that is already gone is a no-op.

mod snapshot_cache;
pub use snapshot_cache::*;

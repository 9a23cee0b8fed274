use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::trace;

use crate::CacheError;
use crate::Snapshot;

type NodeMap = DashMap<String, Arc<NodeState>>;

#[derive(Default)]
struct SubscriberSet {
    senders: HashMap<u64, watch::Sender<Arc<Snapshot>>>,
    /// The entry has left the node map; writers must look the node up again
    retired: bool,
}

/// Per-node entry: current snapshot plus the senders of bound subscribers.
///
/// An entry that never received a snapshot is dropped from the map once its
/// last subscriber leaves, so unconfigured node ids do not accumulate.
struct NodeState {
    node_id: String,
    current: ArcSwap<Snapshot>,
    /// Guards both the swap of `current` and the subscriber set
    subscribers: Mutex<SubscriberSet>,
}

impl NodeState {
    fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            current: ArcSwap::from_pointee(Snapshot::empty(node_id)),
            subscribers: Mutex::new(SubscriberSet::default()),
        }
    }
}

impl std::fmt::Debug for NodeState {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NodeState")
            .field("node_id", &self.node_id)
            .field("sequence", &self.current.load().sequence())
            .field("subscribers", &self.subscribers.lock().senders.len())
            .finish()
    }
}

/// Removes one subscriber and retires the node when it is left without
/// subscribers and without a published snapshot.
fn release(
    nodes: &NodeMap,
    node: &Arc<NodeState>,
    subscriber_id: u64,
) -> bool {
    let (removed, retired) = {
        let mut subscribers = node.subscribers.lock();
        let removed = subscribers.senders.remove(&subscriber_id).is_some();
        if subscribers.senders.is_empty() && node.current.load().is_initial() {
            subscribers.retired = true;
        }
        (removed, subscribers.retired)
    };

    if retired {
        forget(nodes, node);
    }
    removed
}

/// Drops `node` from the map unless the id already points to a newer entry.
fn forget(
    nodes: &NodeMap,
    node: &Arc<NodeState>,
) {
    if nodes.remove_if(&node.node_id, |_, current| Arc::ptr_eq(current, node)).is_some() {
        trace!(node_id = %node.node_id, "Idle node dropped");
    }
}

/// Node id → current snapshot, with atomic replace-and-notify.
#[derive(Debug)]
pub struct SnapshotCache {
    nodes: Arc<NodeMap>,
    next_subscriber_id: AtomicU64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Current snapshot of a node. Unknown nodes get the empty initial
    /// snapshot; this never fails.
    pub fn snapshot(
        &self,
        node_id: &str,
    ) -> Arc<Snapshot> {
        self.nodes
            .get(node_id)
            .map(|node| node.current.load_full())
            .unwrap_or_else(|| Arc::new(Snapshot::empty(node_id)))
    }

    /// Atomically replaces the node's snapshot and notifies every bound
    /// subscriber before returning.
    ///
    /// Notification is a non-blocking `watch` send; subscribers that have
    /// gone away are dropped from the set.
    pub fn set_snapshot(
        &self,
        node_id: &str,
        snapshot: Arc<Snapshot>,
    ) -> std::result::Result<(), CacheError> {
        loop {
            let node = self.node_state(node_id);
            let mut subscribers = node.subscribers.lock();
            if subscribers.retired {
                drop(subscribers);
                forget(&self.nodes, &node);
                continue;
            }

            let current = node.current.load();
            if snapshot.sequence() <= current.sequence() {
                return Err(CacheError::StaleSnapshot {
                    node_id: node_id.to_string(),
                    offered: snapshot.sequence(),
                    current: current.sequence(),
                });
            }

            node.current.store(snapshot.clone());

            subscribers.senders.retain(|id, sender| {
                let alive = sender.send(snapshot.clone()).is_ok();
                if !alive {
                    trace!(node_id, subscriber_id = id, "Dropping closed subscriber");
                }
                alive
            });

            debug!(
                node_id,
                version = snapshot.version(),
                notified = subscribers.senders.len(),
                "Snapshot replaced"
            );
            return Ok(());
        }
    }

    /// Binds a new subscriber to the node. The returned handle already holds
    /// the current snapshot, so a new node is not starved until the next
    /// publish.
    pub fn subscribe(
        &self,
        node_id: &str,
    ) -> SnapshotSubscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        loop {
            let node = self.node_state(node_id);
            let receiver = {
                let mut subscribers = node.subscribers.lock();
                if subscribers.retired {
                    None
                } else {
                    let (sender, receiver) = watch::channel(node.current.load_full());
                    subscribers.senders.insert(id, sender);
                    Some(receiver)
                }
            };
            let Some(receiver) = receiver else {
                forget(&self.nodes, &node);
                continue;
            };

            trace!(node_id, subscriber_id = id, "Subscriber registered");

            return SnapshotSubscription {
                id,
                node_id: node_id.to_string(),
                nodes: self.nodes.clone(),
                node: Some(node),
                receiver,
            };
        }
    }

    /// Deregisters a subscriber. Idempotent; returns whether it was bound.
    pub fn unsubscribe(
        &self,
        node_id: &str,
        subscriber_id: u64,
    ) -> bool {
        let node = self.nodes.get(node_id).map(|node| node.clone());
        node.map(|node| release(&self.nodes, &node, subscriber_id)).unwrap_or(false)
    }

    pub fn subscriber_count(
        &self,
        node_id: &str,
    ) -> usize {
        self.nodes
            .get(node_id)
            .map(|node| node.subscribers.lock().senders.len())
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_state(
        &self,
        node_id: &str,
    ) -> Arc<NodeState> {
        if let Some(node) = self.nodes.get(node_id) {
            return node.clone();
        }
        self.nodes
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(NodeState::new(node_id)))
            .clone()
    }
}

/// Handle for a bound subscriber.
///
/// Dropping the handle deregisters it from the cache.
#[derive(Debug)]
pub struct SnapshotSubscription {
    id: u64,
    node_id: String,
    nodes: Arc<NodeMap>,
    node: Option<Arc<NodeState>>,
    receiver: watch::Receiver<Arc<Snapshot>>,
}

impl SnapshotSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Latest snapshot delivered to this subscriber, marking it as seen.
    pub fn current(&mut self) -> Arc<Snapshot> {
        self.receiver.borrow_and_update().clone()
    }

    /// Waits for the next replacement and returns it.
    ///
    /// Returns `None` once the subscriber has been deregistered.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Deregisters explicitly; later calls to `changed()` return `None`.
    pub fn unsubscribe(&mut self) {
        if let Some(node) = self.node.take() {
            release(&self.nodes, &node, self.id);
            trace!(node_id = %self.node_id, subscriber_id = self.id, "Subscriber unregistered");
        }
    }
}

impl Drop for SnapshotSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

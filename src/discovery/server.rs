use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::debug;
use tracing::info;

use super::DiscoveryStreamHandler;
use crate::metrics::ACTIVE_SESSIONS;
use crate::proto::discovery::DiscoveryRequest;
use crate::proto::discovery::DiscoveryResponse;
use crate::DiscoveryConfig;
use crate::SnapshotCache;

pub type ResponseStream = ReceiverStream<std::result::Result<DiscoveryResponse, Status>>;

/// Accepts discovery streams and spawns one handler task per stream.
///
/// Cloning is cheap; clones share the cache, the shutdown signal and the
/// active stream counter.
#[derive(Debug, Clone)]
pub struct DiscoveryServer {
    cache: Arc<SnapshotCache>,
    config: DiscoveryConfig,
    shutdown: watch::Receiver<()>,
    active_count: Arc<AtomicU64>,
}

impl DiscoveryServer {
    pub fn new(
        cache: Arc<SnapshotCache>,
        config: DiscoveryConfig,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            cache,
            config,
            shutdown,
            active_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Number of streams whose handler is still running.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Spawns the handler for `inbound` and returns the outbound half.
    ///
    /// The handler exits when the client goes away or the shutdown signal
    /// fires. A dropped outbound stream is noticed on the next write.
    pub fn open_stream<S>(
        &self,
        inbound: S,
    ) -> ResponseStream
    where
        S: Stream<Item = std::result::Result<DiscoveryRequest, Status>> + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.config.response_buffer_size);
        let handler = DiscoveryStreamHandler::new(
            self.cache.clone(),
            self.config.default_node_id.clone(),
            inbound,
            self.shutdown.clone(),
        );

        let prev_count = self.active_count.fetch_add(1, Ordering::Relaxed);
        ACTIVE_SESSIONS.inc();
        debug!(active_count = prev_count + 1, "Spawning discovery stream handler");

        let active_count = self.active_count.clone();
        tokio::spawn(async move {
            let end = handler.run(sender).await;

            let prev = active_count.fetch_sub(1, Ordering::Relaxed);
            ACTIVE_SESSIONS.dec();
            info!(active_count = prev - 1, end = ?end, "Discovery stream handler completed");
        });

        ReceiverStream::new(receiver)
    }
}

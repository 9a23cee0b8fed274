use std::sync::Arc;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tonic::Status;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DiscoverySession;
use crate::constants::REQUIRED_RESOURCE_TYPES;
use crate::metrics::ACK_RESPONSES;
use crate::metrics::PUSHES_SENT;
use crate::metrics::TRANSPORT_FAILURES;
use crate::proto::discovery::discovery_request::Kind;
use crate::proto::discovery::DiscoveryRequest;
use crate::proto::discovery::DiscoveryResponse;
use crate::SessionError;
use crate::SnapshotCache;
use crate::SnapshotSubscription;

pub type ResponseSender = mpsc::Sender<std::result::Result<DiscoveryResponse, Status>>;

/// Why a stream handler returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Client half-closed or dropped the inbound stream
    ClientClosed,
    /// Outbound write failed; the client is gone
    TransportFailure,
    /// Request violated the protocol; the client got an error status
    Rejected(SessionError),
    /// Server is shutting down
    Shutdown,
}

/// Owns one discovery stream.
///
/// The handler is the only writer of the outbound channel. It waits on the
/// inbound requests, the node's snapshot notifications and the shutdown
/// signal, and feeds every event through the session.
///
/// ```text
/// inbound requests ─┐
/// SnapshotCache  ───┼─> DiscoverySession ─> ResponseSender ─> gRPC stream
/// shutdown       ───┘
/// ```
pub struct DiscoveryStreamHandler<S> {
    cache: Arc<SnapshotCache>,
    default_node_id: Option<String>,
    inbound: S,
    shutdown: watch::Receiver<()>,
}

impl<S> DiscoveryStreamHandler<S>
where
    S: Stream<Item = std::result::Result<DiscoveryRequest, Status>> + Unpin + Send,
{
    pub fn new(
        cache: Arc<SnapshotCache>,
        default_node_id: Option<String>,
        inbound: S,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            cache,
            default_node_id,
            inbound,
            shutdown,
        }
    }

    /// Drives the stream until the client goes away, a protocol violation,
    /// or shutdown. The node's subscription is released on return.
    pub async fn run(
        mut self,
        sender: ResponseSender,
    ) -> StreamEnd {
        let inbound = tokio::select! {
            inbound = self.inbound.next() => inbound,
            _ = self.shutdown.changed() => {
                debug!("Shutdown before the first request");
                return StreamEnd::Shutdown;
            }
        };
        let first = match inbound {
            Some(Ok(request)) => request,
            Some(Err(status)) => {
                debug!(%status, "Stream failed before the first request");
                return StreamEnd::ClientClosed;
            }
            None => return StreamEnd::ClientClosed,
        };

        let node_id = match self.resolve_node_id(&first) {
            Ok(node_id) => node_id,
            Err(e) => {
                warn!("Rejecting stream: {}", e);
                let _ = sender.send(Err(e.clone().into())).await;
                return StreamEnd::Rejected(e);
            }
        };

        let mut subscription = self.cache.subscribe(&node_id);
        let mut session = DiscoverySession::new(node_id.clone());
        session.on_snapshot(subscription.current());

        info!(node_id = %node_id, subscriber_id = subscription.id(), "Discovery stream bound");

        let end = self.drive(&mut session, &mut subscription, first, &sender).await;

        session.close();
        subscription.unsubscribe();
        if end == StreamEnd::TransportFailure {
            TRANSPORT_FAILURES.inc();
        }
        info!(node_id = %node_id, end = ?end, "Discovery stream finished");
        end
    }

    async fn drive(
        &mut self,
        session: &mut DiscoverySession,
        subscription: &mut SnapshotSubscription,
        first: DiscoveryRequest,
        sender: &ResponseSender,
    ) -> StreamEnd {
        if let Some(end) = Self::on_request(session, first, sender).await {
            return end;
        }

        loop {
            tokio::select! {
                inbound = self.inbound.next() => {
                    let request = match inbound {
                        Some(Ok(request)) => request,
                        Some(Err(status)) => {
                            debug!(node_id = %session.node_id(), %status, "Inbound stream error");
                            return StreamEnd::ClientClosed;
                        }
                        None => return StreamEnd::ClientClosed,
                    };
                    if let Some(end) = Self::on_request(session, request, sender).await {
                        return end;
                    }
                }

                changed = subscription.changed() => {
                    let Some(snapshot) = changed else {
                        return StreamEnd::Shutdown;
                    };
                    let pushes = session.on_snapshot(snapshot);
                    if Self::send_all(session, pushes, sender).await.is_err() {
                        return StreamEnd::TransportFailure;
                    }
                }

                _ = self.shutdown.changed() => {
                    return StreamEnd::Shutdown;
                }
            }
        }
    }

    /// Returns `Some` when the request ends the stream.
    async fn on_request(
        session: &mut DiscoverySession,
        request: DiscoveryRequest,
        sender: &ResponseSender,
    ) -> Option<StreamEnd> {
        let ack_outcome = match &request.kind {
            Some(Kind::Ack(ack)) => Some((ack.type_url.clone(), if ack.accepted { "ack" } else { "nack" })),
            _ => None,
        };

        match session.handle_request(request) {
            Ok(pushes) => {
                if let Some((type_url, outcome)) = ack_outcome {
                    ACK_RESPONSES.with_label_values(&[type_label(&type_url), outcome]).inc();
                }
                if Self::send_all(session, pushes, sender).await.is_err() {
                    return Some(StreamEnd::TransportFailure);
                }
                None
            }
            Err(SessionError::StaleAck {
                type_url,
                nonce,
                expected,
            }) => {
                debug!(node_id = %session.node_id(), %type_url, %nonce, ?expected, "Ignoring stale response");
                ACK_RESPONSES.with_label_values(&[type_label(&type_url), "stale"]).inc();
                None
            }
            Err(e @ (SessionError::UnknownResourceType(_) | SessionError::EmptyRequest)) => {
                warn!(node_id = %session.node_id(), "Ignoring request: {}", e);
                None
            }
            Err(e) => {
                warn!(node_id = %session.node_id(), "Closing stream: {}", e);
                let _ = sender.send(Err(e.clone().into())).await;
                Some(StreamEnd::Rejected(e))
            }
        }
    }

    async fn send_all(
        session: &mut DiscoverySession,
        pushes: Vec<DiscoveryResponse>,
        sender: &ResponseSender,
    ) -> std::result::Result<(), SessionError> {
        for push in pushes {
            let type_url = push.type_url.clone();
            if sender.send(Ok(push)).await.is_err() {
                let e = SessionError::TransportFailure {
                    node_id: session.node_id().to_string(),
                };
                info!("{}", e);
                session.close();
                return Err(e);
            }
            PUSHES_SENT.with_label_values(&[&type_url]).inc();
        }
        Ok(())
    }

    fn resolve_node_id(
        &self,
        first: &DiscoveryRequest,
    ) -> std::result::Result<String, SessionError> {
        match first.node.as_ref().map(|node| node.id.as_str()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => self.default_node_id.clone().ok_or(SessionError::MissingNodeId),
        }
    }
}

/// Client-supplied type URLs are only used as metric labels when served.
pub(crate) fn type_label(type_url: &str) -> &str {
    REQUIRED_RESOURCE_TYPES
        .iter()
        .copied()
        .find(|served| *served == type_url)
        .unwrap_or("unknown")
}

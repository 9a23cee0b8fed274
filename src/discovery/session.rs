use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::constants::REQUIRED_RESOURCE_TYPES;
use crate::proto::discovery::discovery_request::Kind;
use crate::proto::discovery::DiscoveryRequest;
use crate::proto::discovery::DiscoveryResponse;
use crate::proto::discovery::Resource as ProtoResource;
use crate::SessionError;
use crate::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Bound to a node, no push sent yet
    Fresh,
    /// At least one push sent; later pushes queue per type behind the
    /// outstanding one
    Streaming,
    /// Terminal; every later event is a no-op
    Closed,
}

/// Push that has not been acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPush {
    pub nonce: String,
    pub version: String,
}

/// Last revision a node refused for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub version: String,
    pub reason: String,
}

/// Per-type subscription and acknowledgement progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeState {
    /// Empty means every resource of the type
    names: Vec<String>,
    last_sent_version: Option<String>,
    last_acked_version: Option<String>,
    pending: Option<PendingPush>,
    last_rejection: Option<Rejection>,
    /// Filter changed: re-offer even if the type version did not move
    reoffer: bool,
}

impl TypeState {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn last_sent_version(&self) -> Option<&str> {
        self.last_sent_version.as_deref()
    }

    pub fn last_acked_version(&self) -> Option<&str> {
        self.last_acked_version.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingPush> {
        self.pending.as_ref()
    }

    pub fn last_rejection(&self) -> Option<&Rejection> {
        self.last_rejection.as_ref()
    }
}

/// Server-side state of one connected node.
///
/// The session is a plain state machine: every event returns the pushes it
/// produced and the caller owns the outbound stream. It is driven by a
/// single task, so it needs no locking.
#[derive(Debug)]
pub struct DiscoverySession {
    node_id: String,
    state: SessionState,
    latest: Arc<Snapshot>,
    types: BTreeMap<String, TypeState>,
    next_nonce: u64,
}

impl DiscoverySession {
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            latest: Arc::new(Snapshot::empty(&node_id)),
            node_id,
            state: SessionState::Fresh,
            types: BTreeMap::new(),
            next_nonce: 0,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Latest snapshot this session has observed.
    pub fn latest(&self) -> &Arc<Snapshot> {
        &self.latest
    }

    pub fn type_state(
        &self,
        type_url: &str,
    ) -> Option<&TypeState> {
        self.types.get(type_url)
    }

    /// Routes one inbound request to the matching event.
    pub fn handle_request(
        &mut self,
        request: DiscoveryRequest,
    ) -> Result<Vec<DiscoveryResponse>, SessionError> {
        if let Some(node) = &request.node {
            if !node.id.is_empty() && node.id != self.node_id {
                return Err(SessionError::NodeMismatch {
                    bound: self.node_id.clone(),
                    received: node.id.clone(),
                });
            }
        }

        match request.kind {
            Some(Kind::Subscribe(subscribe)) => self.on_subscribe(&subscribe.type_url, subscribe.resource_names),
            Some(Kind::Ack(ack)) if ack.accepted => self.on_ack(&ack.type_url, &ack.version_info, &ack.response_nonce),
            Some(Kind::Ack(nack)) => self.on_nack(
                &nack.type_url,
                &nack.version_info,
                &nack.response_nonce,
                &nack.error_detail,
            ),
            None => Err(SessionError::EmptyRequest),
        }
    }

    /// Records or replaces the subscription for one type and offers the
    /// latest snapshot's content for it right away.
    pub fn on_subscribe(
        &mut self,
        type_url: &str,
        names: Vec<String>,
    ) -> Result<Vec<DiscoveryResponse>, SessionError> {
        if self.is_closed() {
            return Ok(Vec::new());
        }
        if !REQUIRED_RESOURCE_TYPES.iter().any(|t| *t == type_url) {
            return Err(SessionError::UnknownResourceType(type_url.to_string()));
        }

        let mut names = names;
        names.sort();
        names.dedup();

        let record = self.types.entry(type_url.to_string()).or_default();
        if record.names != names {
            // A first subscription has nothing sent yet, so the flag only
            // matters for a replaced filter.
            record.reoffer = record.last_sent_version.is_some();
            record.names = names;
        }

        debug!(node_id = %self.node_id, type_url, names = ?self.types[type_url].names, "Subscription recorded");

        Ok(self.offer(type_url).into_iter().collect())
    }

    /// Observes a newly published snapshot.
    ///
    /// Snapshots that do not advance past the latest one seen are ignored.
    /// Types with an outstanding push are deferred; a later snapshot
    /// supersedes whatever was deferred.
    pub fn on_snapshot(
        &mut self,
        snapshot: Arc<Snapshot>,
    ) -> Vec<DiscoveryResponse> {
        if self.is_closed() {
            return Vec::new();
        }
        if snapshot.sequence() <= self.latest.sequence() {
            trace!(
                node_id = %self.node_id,
                offered = snapshot.sequence(),
                latest = self.latest.sequence(),
                "Ignoring snapshot that does not advance"
            );
            return Vec::new();
        }

        self.latest = snapshot;

        let type_urls: Vec<String> = self.types.keys().cloned().collect();
        type_urls.iter().filter_map(|type_url| self.offer(type_url)).collect()
    }

    /// Client applied the push identified by `nonce`.
    pub fn on_ack(
        &mut self,
        type_url: &str,
        version: &str,
        nonce: &str,
    ) -> Result<Vec<DiscoveryResponse>, SessionError> {
        if self.is_closed() {
            return Ok(Vec::new());
        }
        let pending = self.take_pending(type_url, nonce)?;

        if pending.version != version {
            debug!(
                node_id = %self.node_id,
                type_url,
                pushed = %pending.version,
                acked = version,
                "Ack reports a different version than pushed"
            );
        }

        if let Some(record) = self.types.get_mut(type_url) {
            record.last_acked_version = Some(pending.version);
        }
        trace!(node_id = %self.node_id, type_url, nonce, "Push acknowledged");

        Ok(self.offer(type_url).into_iter().collect())
    }

    /// Client refused the push identified by `nonce`.
    ///
    /// The acked version stays where it was and the refused version is not
    /// offered again; a newer version that arrived meanwhile is.
    pub fn on_nack(
        &mut self,
        type_url: &str,
        version: &str,
        nonce: &str,
        reason: &str,
    ) -> Result<Vec<DiscoveryResponse>, SessionError> {
        if self.is_closed() {
            return Ok(Vec::new());
        }
        let pending = self.take_pending(type_url, nonce)?;

        let rejected = SessionError::RejectedRevision {
            node_id: self.node_id.clone(),
            type_url: type_url.to_string(),
            version: pending.version.clone(),
            reason: reason.to_string(),
        };
        warn!(reported_version = version, "{}", rejected);

        if let Some(record) = self.types.get_mut(type_url) {
            record.last_rejection = Some(Rejection {
                version: pending.version,
                reason: reason.to_string(),
            });
        }

        Ok(self.offer(type_url).into_iter().collect())
    }

    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!(node_id = %self.node_id, "Session closed");
            self.state = SessionState::Closed;
        }
    }

    fn take_pending(
        &mut self,
        type_url: &str,
        nonce: &str,
    ) -> Result<PendingPush, SessionError> {
        let record = self.types.get_mut(type_url);
        let expected = record.as_ref().and_then(|r| r.pending.as_ref()).map(|p| p.nonce.clone());

        if expected.as_deref() == Some(nonce) {
            if let Some(pending) = record.and_then(|r| r.pending.take()) {
                return Ok(pending);
            }
        }
        Err(SessionError::StaleAck {
            type_url: type_url.to_string(),
            nonce: nonce.to_string(),
            expected,
        })
    }

    /// Builds the push for one type if the latest snapshot moved past what
    /// was last sent and nothing is outstanding.
    fn offer(
        &mut self,
        type_url: &str,
    ) -> Option<DiscoveryResponse> {
        if self.latest.is_initial() {
            return None;
        }
        let version = self.latest.type_version(type_url)?;
        let record = self.types.get_mut(type_url)?;

        if record.pending.is_some() {
            trace!(node_id = %self.node_id, type_url, "Push outstanding; deferring");
            return None;
        }
        if !record.reoffer && record.last_sent_version.as_deref() == Some(version) {
            return None;
        }

        self.next_nonce += 1;
        let nonce = self.next_nonce.to_string();

        let resources = self
            .latest
            .resources_of(type_url, &record.names)
            .map(|(key, resource)| ProtoResource {
                name: key.name().to_string(),
                version: resource.version(),
                payload: resource.payload().clone(),
            })
            .collect();

        record.reoffer = false;
        record.last_sent_version = Some(version.to_string());
        self.state = SessionState::Streaming;
        record.pending = Some(PendingPush {
            nonce: nonce.clone(),
            version: version.to_string(),
        });

        debug!(
            node_id = %self.node_id,
            type_url,
            version,
            snapshot = self.latest.version(),
            nonce = %nonce,
            "Pushing revision"
        );

        Some(DiscoveryResponse {
            type_url: type_url.to_string(),
            version_info: version.to_string(),
            nonce,
            snapshot_version: self.latest.version().to_string(),
            resources,
        })
    }
}

//! Control Plane Error Hierarchy
//!
//! Errors are grouped by the layer that produces them. Operator-facing
//! failures (`Publish`, `Store`) are returned synchronously; per-session
//! failures ([`SessionError`]) never leave the session that raised them.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Resource store rejected a write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Snapshot could not be assembled
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Snapshot cache rejected a publish
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Operator publish request was malformed
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Infrastructure-level failures (network, signals, IO)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Node identifier must not be empty")]
    EmptyNodeId,

    #[error("Resource type must not be empty")]
    EmptyTypeUrl,

    /// Names are validated at the store boundary instead of trusting
    /// whatever string formatting produced them.
    #[error("Invalid resource name {name:?}: {reason}")]
    InvalidResourceName { name: String, reason: &'static str },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// A resource whose type is not carried by the discovery protocol
    #[error("Resource {name:?} has type {type_url:?} which is not carried in snapshots")]
    UnknownResourceType { type_url: String, name: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// Publishing a snapshot that does not advance the node's sequence
    #[error("Stale snapshot for node {node_id}: sequence {offered} does not exceed current {current}")]
    StaleSnapshot {
        node_id: String,
        offered: u64,
        current: u64,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("{field} must not be negative, got {value}")]
    NegativeCount { field: String, value: i64 },

    #[error("Invalid tenant identifier {tenant:?}: {reason}")]
    InvalidTenant { tenant: String, reason: String },
}

/// Session-local failures.
///
/// These are logged and counted by the stream handler; none of them is
/// propagated to the cache, the store or to other sessions.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// Ack/Nack whose nonce does not match the outstanding push for the type
    #[error("Stale response for {type_url}: nonce {nonce:?}, expected {expected:?}")]
    StaleAck {
        type_url: String,
        nonce: String,
        expected: Option<String>,
    },

    /// Client rejected a pushed revision
    #[error("Node {node_id} rejected {type_url} version {version}: {reason}")]
    RejectedRevision {
        node_id: String,
        type_url: String,
        version: String,
        reason: String,
    },

    /// Writing to the outbound stream failed; the session is torn down
    #[error("Transport failure on stream for node {node_id}")]
    TransportFailure { node_id: String },

    #[error("First request on a stream must identify the node")]
    MissingNodeId,

    #[error("Stream bound to node {bound} received a request for node {received}")]
    NodeMismatch { bound: String, received: String },

    #[error("Resource type {0:?} is not served")]
    UnknownResourceType(String),

    #[error("Request carries neither a subscription nor an acknowledgement")]
    EmptyRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// gRPC transport layer errors: bind failures and listener errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to send shutdown signal: {0}")]
    SignalSendFailed(String),
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        NetworkError::TonicError(Box::new(e)).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Store(_) | Error::Publish(_) => tonic::Status::invalid_argument(e.to_string()),
            Error::Cache(_) => tonic::Status::failed_precondition(e.to_string()),
            _ => tonic::Status::internal(e.to_string()),
        }
    }
}

impl From<SessionError> for tonic::Status {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MissingNodeId | SessionError::NodeMismatch { .. } | SessionError::EmptyRequest => {
                tonic::Status::invalid_argument(e.to_string())
            }
            _ => tonic::Status::internal(e.to_string()),
        }
    }
}

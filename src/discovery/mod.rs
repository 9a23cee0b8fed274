//! Aggregated discovery protocol.
//!
//! One bidirectional stream per connected node multiplexes every resource
//! type. A [`DiscoverySession`] tracks what the node subscribed to and which
//! revisions it has acknowledged; a [`DiscoveryStreamHandler`] task owns the
//! session for the lifetime of the stream; the [`DiscoveryServer`] spawns
//! those tasks and counts them.
//!
//! # Session lifecycle
//!
//! ```text
//! Fresh ──first push──> Streaming ──close / transport failure / shutdown──> Closed
//! ```
//!
//! Per type the session keeps at most one unacknowledged push. Revisions that
//! arrive meanwhile are deferred, and only the newest one is offered once the
//! outstanding push is acked or nacked.

mod server;
mod session;
mod stream_handler;
pub use server::*;
pub use session::*;
pub use stream_handler::*;

//! Runtime-configuration control plane for shuffle-sharded data planes.
//!
//! Operators publish a node's shard configuration through
//! [`ConfigPublisher`]; every data-plane node holding a discovery stream for
//! that node id converges on the new values through a per-type
//! push/ack protocol ([`DiscoverySession`]).

mod cache;
mod config;
pub mod constants;
mod control_plane;
mod discovery;
mod errors;
pub mod metrics;
mod network;
pub mod proto;
mod resource;
mod snapshot;
mod store;

pub use cache::*;
pub use config::*;
pub use control_plane::*;
pub use discovery::*;
pub use errors::*;
pub use network::grpc::*;
pub use resource::*;
pub use snapshot::*;
pub use store::*;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms10, ObjectivePercentile::P99);

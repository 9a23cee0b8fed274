//! gRPC surface of the control plane.
//!
//! Thin adapters only: the discovery stream is handed to
//! [`DiscoveryServer`](crate::DiscoveryServer) and operator calls to a
//! [`ConfigPublisher`](crate::ConfigPublisher). No engine state lives here.
pub mod grpc;

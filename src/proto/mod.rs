//! Protocol Buffer definitions and generated code for RPC services.
//!
//! Generated by [`tonic-build`] from `proto/*.proto` at build time.

pub mod discovery {
    tonic::include_proto!("shard.discovery.v1");
}

pub mod runtime_config {
    tonic::include_proto!("shard.config.v1");
}

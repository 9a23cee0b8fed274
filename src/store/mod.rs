//! Desired-state store.
//!
//! Holds, per node, the latest resources submitted by operators and versions
//! every write. The store is pure: publishing a new snapshot after a write is
//! the caller's job (see [`crate::ControlPlane`]).

mod config_store;
pub use config_store::*;

//! Immutable snapshots and the builder that stamps them.
//!
//! A [`Snapshot`] bundles one entry per carried resource type, each with its
//! own version, under a single outer version. Snapshots are never mutated
//! after construction; updates always produce a new one.

mod builder;
#[allow(clippy::module_inception)]
mod snapshot;
pub use builder::*;
pub use snapshot::*;

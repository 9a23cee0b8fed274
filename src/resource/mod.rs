//! Resource model shared by the store, the snapshot builder and the
//! discovery sessions.
//!
//! A resource is addressed by a structured [`ResourceKey`] and carries an
//! opaque payload plus the store-assigned revision. The engine never looks
//! inside payloads.

mod resource_set;
pub use resource_set::*;

//! A local, sharded content-addressed blob store.
//!
//! This is the default local tier behind `kiln-core`'s `ArtifactCache`
//! trait: a task's identity hash becomes the key, the published artifact's
//! bytes become the value. Kept deliberately small and swappable — nothing
//! in `kiln-core` depends on this crate's internals beyond `LocalCas`'s
//! public methods, so an embedder can substitute their own tier by
//! implementing the `ArtifactCache` trait directly instead.

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{BlobId, LocalCas};

//! Error type for the local content-addressed store.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`crate::CasStore`].
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// An IO operation against the blob store's backing directory failed.
    #[error("cas io error during {operation} on {path:?}")]
    #[diagnostic(code(kiln::cas::io), help("check permissions on the cache root"))]
    Io {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// Path involved, if any.
        path: Option<PathBuf>,
        /// Operation being attempted (`store`, `load`, `delete`, ...).
        operation: String,
    },

    /// A hex string passed to [`crate::BlobId::from_hex`] was not a valid
    /// 64-character SHA-256 digest.
    #[error("invalid blob id {value:?}: {reason}")]
    #[diagnostic(code(kiln::cas::invalid_blob_id))]
    InvalidBlobId {
        /// The offending string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A loaded blob's content hash did not match its id — the store is
    /// corrupt, or the path was tampered with.
    #[error("blob integrity check failed: expected {expected}, computed {computed}")]
    #[diagnostic(
        code(kiln::cas::integrity),
        help("the blob on disk does not match its content hash; the cache root may be corrupt")
    )]
    Integrity {
        /// Id the caller asked for.
        expected: String,
        /// Id actually computed from the bytes on disk.
        computed: String,
    },
}

/// Convenience alias for fallible CAS operations.
pub type Result<T> = std::result::Result<T, Error>;

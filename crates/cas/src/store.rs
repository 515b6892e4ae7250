//! `LocalCas`: a two-level-sharded, SHA-256 content-addressed blob store.
//!
//! Grounded on the teacher's `cache/cas.rs`: same directory layout
//! (`{root}/{id[0:2]}/{id[2:4]}/{id}`), same atomic write-then-rename, same
//! integrity check on read. Trimmed to what `kiln-core`'s `ArtifactCache`
//! local tier actually needs — no task-cache-entry metadata, no GC, those
//! stay out of scope for this crate (the identity-keyed artifact layout
//! above it is `kiln-core`'s concern, not the blob store's).

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A content hash (SHA-256, lowercase hex) naming a blob in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(String);

impl BlobId {
    /// Compute the id of some bytes without storing them.
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Parse an existing hex digest, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlobId`] if `hex` is not 64 hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let s = hex.into();
        if s.len() != 64 {
            return Err(Error::InvalidBlobId {
                reason: format!("must be 64 hex characters, got {}", s.len()),
                value: s,
            });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidBlobId {
                reason: "must contain only hex digits".into(),
                value: s,
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The hex representation, as stored on disk and used as a cache key.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A local, filesystem-backed content-addressed blob store.
#[derive(Debug, Clone)]
pub struct LocalCas {
    root: PathBuf,
}

impl LocalCas {
    /// Open (without yet creating) a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory this store is backed by.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        let hex = id.as_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }

    fn io_err(source: std::io::Error, path: &Path, operation: &str) -> Error {
        Error::Io {
            source,
            path: Some(path.to_path_buf()),
            operation: operation.to_string(),
        }
    }

    /// Store `data`, returning its content id. A no-op if the blob already
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails.
    pub fn store(&self, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::from_data(data);
        let path = self.blob_path(&id);
        if path.exists() {
            return Ok(id);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::io_err(e, parent, "create_dir_all"))?;
        }

        let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
        let mut file =
            fs::File::create(&tmp_path).map_err(|e| Self::io_err(e, &tmp_path, "create"))?;
        file.write_all(data)
            .map_err(|e| Self::io_err(e, &tmp_path, "write"))?;
        file.sync_all()
            .map_err(|e| Self::io_err(e, &tmp_path, "sync"))?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| Self::io_err(e, &path, "rename"))?;
        Ok(id)
    }

    /// Load a blob by id, verifying its hash on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the blob is missing/unreadable, or
    /// [`Error::Integrity`] if the bytes on disk don't hash to `id`.
    pub fn load(&self, id: &BlobId) -> Result<Vec<u8>> {
        let path = self.blob_path(id);
        let data = fs::read(&path).map_err(|e| Self::io_err(e, &path, "read"))?;

        let computed = BlobId::from_data(&data);
        if computed != *id {
            return Err(Error::Integrity {
                expected: id.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(data)
    }

    /// Whether a blob with this id is present.
    #[must_use]
    pub fn exists(&self, id: &BlobId) -> bool {
        self.blob_path(id).exists()
    }

    /// Size in bytes of a stored blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the blob is missing or its metadata can't be read.
    pub fn size(&self, id: &BlobId) -> Result<u64> {
        let path = self.blob_path(id);
        let metadata = fs::metadata(&path).map_err(|e| Self::io_err(e, &path, "metadata"))?;
        Ok(metadata.len())
    }

    /// Remove a blob. A no-op if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if removal fails for a reason other than
    /// non-existence.
    pub fn delete(&self, id: &BlobId) -> Result<()> {
        let path = self.blob_path(id);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|e| Self::io_err(e, &path, "remove_file"))
    }
}

//! `ArtifactCache`: the trait boundary for local + remote artifact
//! availability (spec §4.6, §6), plus `LocalArtifactCache`, the default
//! local tier this crate ships so it is runnable without an external cache
//! backend.
//!
//! Two key spaces are deliberately kept separate, mirroring the teacher's
//! two-tier cache architecture (`cache/mod.rs`'s CAS + task-cache-entry
//! split): a task's 40-character SHA-1 `identity` names *which* artifact is
//! wanted, while the bytes underneath are content-addressed by `kiln-cas`
//! under their own SHA-256 hash, so identical outputs from different tasks
//! still dedupe. A small identity -> blob-id index file bridges the two.

use crate::error::CacheError;
use async_trait::async_trait;
use kiln_cas::{BlobId, LocalCas};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn cache_error(source: std::io::Error, operation: &'static str) -> CacheError {
    CacheError::Cas(kiln_cas::Error::Io {
        source,
        path: None,
        operation: operation.to_string(),
    })
}

/// A scratch directory scoped to one task's build: opened fresh before the
/// user's `run` callable, discarded afterward regardless of outcome.
pub struct BuildContextHandle {
    dir: tempfile::TempDir,
}

impl BuildContextHandle {
    /// The scratch directory's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A handle to a not-yet-committed artifact. `publish` writes bytes into it;
/// the caller then calls exactly one of [`ArtifactHandle::commit`] or
/// [`ArtifactHandle::discard`].
pub struct ArtifactHandle {
    identity: String,
    buffer: Vec<u8>,
}

impl ArtifactHandle {
    /// Append bytes to the artifact under construction.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// The identity this handle will publish under.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Local + remote artifact availability, download, upload, and the two
/// scoped resources a task's run needs: a build context and an artifact
/// handle (spec §6).
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Whether the artifact is present in the local tier.
    async fn is_available_locally(&self, identity: &str) -> bool;

    /// Whether the artifact is present in the remote tier, if any.
    async fn is_available_remotely(&self, identity: &str) -> bool;

    /// Local-or-remote (when `network` is true) availability.
    async fn is_available(&self, identity: &str, network: bool) -> bool {
        self.is_available_locally(identity).await
            || (network && self.is_available_remotely(identity).await)
    }

    /// Pull the remote artifact down into the local tier.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DownloadFailed`] if the remote tier errors or
    /// is unreachable; callers treat this as non-fatal and fall back to a
    /// local build.
    async fn download(&self, identity: &str) -> Result<(), CacheError>;

    /// Push the local artifact to the remote tier.
    ///
    /// Returns `Ok(true)` if an upload actually happened, `Ok(false)` if
    /// there was nothing to do (no remote tier configured).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UploadFailed`] if a remote tier is configured
    /// but the upload failed; the caller treats this as fatal when it
    /// requested remote availability.
    async fn upload(&self, identity: &str, force: bool) -> Result<bool, CacheError>;

    /// Open a scoped scratch directory for the task's `run` callable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the scratch directory could not be created.
    async fn get_context(&self, identity: &str) -> Result<BuildContextHandle, CacheError>;

    /// Acquire a fresh (uncommitted) artifact handle for the task's
    /// `publish` callable to write into.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the handle could not be allocated.
    async fn get_artifact(&self, identity: &str) -> Result<ArtifactHandle, CacheError>;

    /// Commit a written artifact, making it locally available under its identity.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the underlying store write fails.
    async fn commit(&self, handle: ArtifactHandle) -> Result<(), CacheError>;

    /// Discard a written artifact without publishing it.
    fn discard(&self, _handle: ArtifactHandle) {}

    /// Remove a stale local artifact before a rebuild, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if removal fails for a reason other than
    /// non-existence.
    async fn discard_local(&self, identity: &str) -> Result<(), CacheError>;
}

/// Pluggable remote tier. `LocalArtifactCache` has none by default; an
/// embedder wires one in via [`LocalArtifactCache::with_remote`].
#[async_trait]
pub trait RemoteArtifactCache: Send + Sync {
    /// Whether the remote holds this identity.
    async fn is_available(&self, identity: &str) -> bool;
    /// Fetch the artifact's bytes.
    async fn download(&self, identity: &str) -> Result<Vec<u8>, CacheError>;
    /// Publish the artifact's bytes.
    async fn upload(&self, identity: &str, bytes: &[u8]) -> Result<(), CacheError>;
}

/// The default local artifact tier: a sharded CAS blob store plus a small
/// identity -> blob-id index, with an optional pluggable remote tier.
pub struct LocalArtifactCache {
    cas: LocalCas,
    index_root: PathBuf,
    remote: Option<Arc<dyn RemoteArtifactCache>>,
}

impl LocalArtifactCache {
    /// Open (without creating) a local cache rooted at `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            cas: LocalCas::new(cache_dir.join("blobs")),
            index_root: cache_dir.join("index"),
            remote: None,
        }
    }

    /// Wire in a remote tier.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteArtifactCache>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn index_path(&self, identity: &str) -> PathBuf {
        self.index_root.join(identity)
    }

    fn read_blob_id(&self, identity: &str) -> Option<BlobId> {
        let hex = std::fs::read_to_string(self.index_path(identity)).ok()?;
        BlobId::from_hex(hex.trim()).ok()
    }
}

#[async_trait]
impl ArtifactCache for LocalArtifactCache {
    async fn is_available_locally(&self, identity: &str) -> bool {
        self.read_blob_id(identity)
            .is_some_and(|id| self.cas.exists(&id))
    }

    async fn is_available_remotely(&self, identity: &str) -> bool {
        match &self.remote {
            Some(remote) => remote.is_available(identity).await,
            None => false,
        }
    }

    async fn download(&self, identity: &str) -> Result<(), CacheError> {
        let Some(remote) = &self.remote else {
            return Err(CacheError::DownloadFailed {
                qualified_name: identity.to_string(),
                source: "no remote tier configured".into(),
            });
        };
        let bytes = remote
            .download(identity)
            .await
            .map_err(|e| CacheError::DownloadFailed {
                qualified_name: identity.to_string(),
                source: e.to_string().into(),
            })?;
        let blob_id = self.cas.store(&bytes)?;
        std::fs::create_dir_all(&self.index_root)
            .map_err(|e| cache_error(e, "create_dir_all"))?;
        std::fs::write(self.index_path(identity), blob_id.to_string())
            .map_err(|e| cache_error(e, "write"))?;
        Ok(())
    }

    async fn upload(&self, identity: &str, force: bool) -> Result<bool, CacheError> {
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        if !force && remote.is_available(identity).await {
            return Ok(false);
        }
        let blob_id = self.read_blob_id(identity).ok_or_else(|| CacheError::UploadFailed {
            qualified_name: identity.to_string(),
            source: "no local artifact to upload".into(),
        })?;
        let bytes = self.cas.load(&blob_id)?;
        remote
            .upload(identity, &bytes)
            .await
            .map_err(|e| CacheError::UploadFailed {
                qualified_name: identity.to_string(),
                source: e.to_string().into(),
            })?;
        Ok(true)
    }

    async fn get_context(&self, _identity: &str) -> Result<BuildContextHandle, CacheError> {
        let dir = tempfile::tempdir().map_err(|e| cache_error(e, "tempdir"))?;
        Ok(BuildContextHandle { dir })
    }

    async fn get_artifact(&self, identity: &str) -> Result<ArtifactHandle, CacheError> {
        Ok(ArtifactHandle {
            identity: identity.to_string(),
            buffer: Vec::new(),
        })
    }

    async fn commit(&self, handle: ArtifactHandle) -> Result<(), CacheError> {
        let blob_id = self.cas.store(&handle.buffer)?;
        std::fs::create_dir_all(&self.index_root)
            .map_err(|e| cache_error(e, "create_dir_all"))?;
        std::fs::write(self.index_path(&handle.identity), blob_id.to_string())
            .map_err(|e| cache_error(e, "write"))?;
        Ok(())
    }

    async fn discard_local(&self, identity: &str) -> Result<(), CacheError> {
        let path = self.index_path(identity);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| cache_error(e, "remove_file"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_identity_is_unavailable_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalArtifactCache::new(dir.path());
        assert!(!cache.is_available_locally("deadbeef").await);
        assert!(!cache.is_available_remotely("deadbeef").await);
        assert!(!cache.is_available("deadbeef", true).await);
    }

    #[tokio::test]
    async fn commit_then_local_availability() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalArtifactCache::new(dir.path());
        let mut handle = cache.get_artifact("abc123").await.unwrap();
        handle.write(b"artifact bytes");
        cache.commit(handle).await.unwrap();
        assert!(cache.is_available_locally("abc123").await);
    }

    #[tokio::test]
    async fn discard_local_removes_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalArtifactCache::new(dir.path());
        let mut handle = cache.get_artifact("xyz").await.unwrap();
        handle.write(b"bytes");
        cache.commit(handle).await.unwrap();
        cache.discard_local("xyz").await.unwrap();
        assert!(!cache.is_available_locally("xyz").await);
    }

    #[tokio::test]
    async fn upload_without_remote_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalArtifactCache::new(dir.path());
        let mut handle = cache.get_artifact("noremote").await.unwrap();
        handle.write(b"bytes");
        cache.commit(handle).await.unwrap();
        assert_eq!(cache.upload("noremote", true).await.unwrap(), false);
    }
}

//! Source-tree identity influence: a reproducible hash of a version-controlled
//! working copy, combining the committed tree state with any uncommitted
//! diff, so both staged and in-flight changes perturb downstream build
//! identities.
//!
//! Shells out to the system `git` binary exactly as the teacher's own
//! VCS-facing commands do (see `commit_analyzer.rs`'s `git diff-tree`
//! invocation) rather than reimplementing git's object model — this stays a
//! thin, pure wrapper over an external, well-tested tool.

mod error;

pub use error::{Error, Result};

use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Produces the identity contribution of a git working copy at some path
/// relative to a workspace root.
///
/// The contribution is the string `"<relpath>:<tree_hash>:<diff_hash[:8]>"`.
/// If `relpath` is not inside a git work tree (a resource task that merely
/// declares a URL+ref rather than an actual clone), both hashes are omitted
/// and the contribution degrades to `"<relpath>::"`.
#[derive(Debug, Clone)]
pub struct GitInfluenceProvider {
    git_binary: String,
}

impl Default for GitInfluenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GitInfluenceProvider {
    /// Use the `git` binary resolved from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            git_binary: "git".to_string(),
        }
    }

    /// Use an explicit path to the `git` binary (tests point this at a
    /// fixture repo's own git, or an embedder might vendor a specific one).
    #[must_use]
    pub fn with_git_binary(git_binary: impl Into<String>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    /// Compute the source-tree influence string for `relpath` (relative to
    /// `workspace_root`, which must itself be the git worktree's root or a
    /// directory git can resolve upward from).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if `git rev-parse` still fails after
    /// one fetch-and-retry, which the spec treats as fatal rather than a
    /// cache-miss-style fallback.
    pub fn source_tree_influence(&self, workspace_root: &Path, relpath: &Path) -> Result<String> {
        if !self.is_clone(workspace_root) {
            return Ok(format!("{}::", relpath.display()));
        }

        let tree_hash = self.tree_hash(workspace_root, relpath)?;
        let diff_hash = self.diff_hash(workspace_root, relpath)?;
        let short = &diff_hash[..diff_hash.len().min(8)];
        Ok(format!("{}:{}:{}", relpath.display(), tree_hash, short))
    }

    fn is_clone(&self, workspace_root: &Path) -> bool {
        Command::new(&self.git_binary)
            .args(["-C", &workspace_root.display().to_string(), "rev-parse", "--is-inside-work-tree"])
            .output()
            .is_ok_and(|out| out.status.success())
    }

    /// `git rev-parse HEAD:./<relpath>` — the hash git itself assigns to the
    /// committed tree/blob at that path. Retries once after a `git fetch` on
    /// a miss, per the spec; a second failure is fatal.
    fn tree_hash(&self, workspace_root: &Path, relpath: &Path) -> Result<String> {
        let spec = format!("HEAD:./{}", relpath.display());
        match self.run(workspace_root, &["rev-parse", &spec], "rev-parse") {
            Ok(out) if out.status.success() => Self::stdout_trimmed(&out, "rev-parse"),
            _ => {
                let _ = self.run(workspace_root, &["fetch"], "fetch");
                let out = self.run(workspace_root, &["rev-parse", &spec], "rev-parse")?;
                if !out.status.success() {
                    return Err(Error::CommandFailed {
                        operation: "rev-parse".to_string(),
                        path: relpath.to_path_buf(),
                        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    });
                }
                Self::stdout_trimmed(&out, "rev-parse")
            }
        }
    }

    /// SHA-1 over the textual diff between `HEAD` and the working copy for
    /// `relpath`; an untouched path hashes the empty string.
    fn diff_hash(&self, workspace_root: &Path, relpath: &Path) -> Result<String> {
        let path_arg = relpath.display().to_string();
        let out = self.run(workspace_root, &["diff", "HEAD", "--", &path_arg], "diff")?;
        let mut hasher = Sha1::new();
        hasher.update(&out.stdout);
        Ok(hex::encode(hasher.finalize()))
    }

    fn run(&self, workspace_root: &Path, args: &[&str], operation: &str) -> Result<Output> {
        Command::new(&self.git_binary)
            .arg("-C")
            .arg(workspace_root)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                source,
                operation: operation.to_string(),
            })
    }

    fn stdout_trimmed(out: &Output, operation: &str) -> Result<String> {
        std::str::from_utf8(&out.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| Error::InvalidOutput {
                operation: operation.to_string(),
            })
    }
}

/// Convenience: the plain path component used when `relpath` is empty
/// (a task influenced by the whole workspace rather than a subdirectory).
#[must_use]
pub fn workspace_relative(workspace_root: &Path, absolute: &Path) -> PathBuf {
    absolute
        .strip_prefix(workspace_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| absolute.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("git must be on PATH for vcs tests");
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
    }

    #[test]
    fn non_clone_path_yields_empty_hashes() {
        let dir = tempdir().unwrap();
        let provider = GitInfluenceProvider::new();
        let influence = provider
            .source_tree_influence(dir.path(), Path::new("src"))
            .unwrap();
        assert_eq!(influence, "src::");
    }

    #[test]
    fn clean_clone_has_empty_diff_hash_segment() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("file.txt"), "hello").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "initial"]);

        let provider = GitInfluenceProvider::new();
        let influence = provider
            .source_tree_influence(dir.path(), Path::new("."))
            .unwrap();
        let parts: Vec<&str> = influence.splitn(3, ':').collect();
        assert_eq!(parts.len(), 3);
        assert!(!parts[1].is_empty(), "tree hash should be present");

        let empty_sha1 = hex::encode(Sha1::digest(b""));
        assert_eq!(parts[2], &empty_sha1[..8]);
    }

    #[test]
    fn dirty_working_copy_changes_diff_hash() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("file.txt"), "hello").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "initial"]);

        let provider = GitInfluenceProvider::new();
        let clean = provider
            .source_tree_influence(dir.path(), Path::new("."))
            .unwrap();

        fs::write(dir.path().join("file.txt"), "hello, world").unwrap();
        let dirty = provider
            .source_tree_influence(dir.path(), Path::new("."))
            .unwrap();

        assert_ne!(clean, dirty);
    }
}

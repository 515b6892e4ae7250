//! Error type for the git-backed source-tree influence provider.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised resolving a [`crate::GitInfluenceProvider`] contribution.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Spawning `git` itself failed (binary missing, permissions, ...).
    #[error("failed to spawn git for {operation}")]
    #[diagnostic(code(kiln::vcs::spawn), help("is `git` on PATH?"))]
    Spawn {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// What we were trying to do (`rev-parse`, `diff`, ...).
        operation: String,
    },

    /// `git` ran but exited non-zero after a fetch-and-retry.
    #[error("git {operation} failed for {path:?}: {stderr}")]
    #[diagnostic(code(kiln::vcs::command_failed))]
    CommandFailed {
        /// What we were trying to do.
        operation: String,
        /// The repo-relative path involved.
        path: PathBuf,
        /// Captured stderr.
        stderr: String,
    },

    /// `git`'s output was not valid UTF-8.
    #[error("git output for {operation} was not valid UTF-8")]
    #[diagnostic(code(kiln::vcs::invalid_output))]
    InvalidOutput {
        /// What we were trying to do.
        operation: String,
    },
}

/// Convenience alias for fallible VCS operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error taxonomy for the build orchestrator (spec §7).
//!
//! Every variant here corresponds to one of the five error classes the
//! design calls out — `GraphError`, `IdentityError`, `RunError`,
//! `CacheError`, `InvariantError` — expressed as `thiserror`-derived enums
//! with `miette` diagnostics, following the pattern the teacher's cache
//! crate already established, rather than the exception-based flow control
//! the original source used.

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while expanding task names into a DAG (`GraphBuilder`).
/// Fatal at build time — no task runs until the whole graph is valid.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// The requirement/extension closure of the requested tasks contains a
    /// cycle. `witness` names the cycle, in traversal order.
    #[error("cycle detected among tasks: {}", .witness.join(" -> "))]
    #[diagnostic(
        code(kiln::core::graph::cycle),
        help("break the cycle by removing one of the listed requires/extends edges")
    )]
    Cycle {
        /// Qualified names forming the cycle.
        witness: Vec<String>,
    },

    /// A `requires` or `extends` edge named a task the registry doesn't know.
    #[error("unknown task {name:?} referenced by {referenced_by:?}")]
    #[diagnostic(code(kiln::core::graph::unknown_task))]
    UnknownTask {
        /// The dangling name.
        name: String,
        /// The task that referenced it.
        referenced_by: String,
    },

    /// Adjacency bookkeeping failure surfaced by `kiln-graph` itself.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Dag(#[from] kiln_graph::Error),
}

/// An influence provider returned an error while contributing to a task's
/// identity hash. Fatal: the build aborts before any task runs, since every
/// downstream identity depends on this one.
#[derive(Debug, Error, Diagnostic)]
#[error("influence provider {provider:?} failed for task {qualified_name:?}")]
#[diagnostic(code(kiln::core::identity))]
pub struct IdentityError {
    /// The provider that raised.
    pub provider: String,
    /// The task whose identity was being computed.
    pub qualified_name: String,
    /// The underlying cause.
    #[source]
    pub source: BoxError,
}

/// The user-supplied `run` or `publish` callable for a task raised.
/// Recorded as `failed` on the proxy; the executor cancels ancestors.
#[derive(Debug, Error, Diagnostic)]
#[error("task {qualified_name:?} failed during {phase}")]
#[diagnostic(code(kiln::core::run))]
pub struct RunError {
    /// The task that failed.
    pub qualified_name: String,
    /// Which callable raised (`run` or `publish`).
    pub phase: &'static str,
    /// The underlying cause.
    #[source]
    pub source: BoxError,
}

/// Errors from the artifact cache boundary. A download miss is recoverable
/// (fall back to a local build); an upload failure after a successful run
/// is not, because the artifact can no longer be certified.
#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    /// Remote or local download failed. Non-fatal: callers fall back to
    /// building locally and only log this at `warn` level.
    #[error("failed to download artifact for {qualified_name:?}")]
    #[diagnostic(code(kiln::core::cache::download))]
    DownloadFailed {
        /// The task whose artifact was requested.
        qualified_name: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// Upload failed after the task's run succeeded. Fatal when the caller
    /// asked for remote availability, because we can no longer certify the
    /// artifact exists anywhere durable.
    #[error("failed to upload artifact for {qualified_name:?} after a successful run")]
    #[diagnostic(
        code(kiln::core::cache::upload),
        help("the task ran successfully but its artifact could not be published; rerun once the cache backend recovers")
    )]
    UploadFailed {
        /// The task whose artifact failed to publish.
        qualified_name: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// The local CAS blob store raised.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cas(#[from] kiln_cas::Error),
}

/// A core bug, not recoverable user input: re-completing an already
/// completed proxy, or running an extension outside its host's sequence.
#[derive(Debug, Error, Diagnostic)]
pub enum InvariantError {
    /// `TaskProxy::finished` was called on a proxy that was already
    /// `completed`.
    #[error("task {qualified_name:?} completed more than once")]
    #[diagnostic(code(kiln::core::invariant::recompletion))]
    ReCompletion {
        /// The offending task.
        qualified_name: String,
    },

    /// An extension proxy was asked to run directly, outside its host's
    /// `run` sequence.
    #[error("extension task {qualified_name:?} cannot run in isolation")]
    #[diagnostic(code(kiln::core::invariant::extension_isolation))]
    ExtensionRunInIsolation {
        /// The offending extension.
        qualified_name: String,
    },
}

/// The aggregated error type returned by `kiln-core`'s public API.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// See [`GraphError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    /// See [`IdentityError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),

    /// See [`RunError`]. Wrapped in an `Arc` so it can be cloned into every
    /// cancelled ancestor's result without re-running the failed task.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Run(#[from] RunError),

    /// See [`CacheError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    /// See [`InvariantError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Invariant(#[from] InvariantError),

    /// A dependency's failure propagated to a still-pending ancestor via
    /// cancellation rather than via its own `run`.
    #[error("build cancelled: ancestor of failed task {qualified_name:?}")]
    #[diagnostic(code(kiln::core::cancelled))]
    Cancelled {
        /// The task that was cancelled.
        qualified_name: String,
        /// The root cause, shared across every cancelled ancestor.
        #[source]
        cause: Arc<Error>,
    },
}

/// Convenience alias for fallible core operations.
pub type Result<T> = std::result::Result<T, Error>;

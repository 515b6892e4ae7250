//! Graph construction, identity computation, and the execution engine for
//! kiln's task-based incremental build orchestrator.
//!
//! This crate is the core described by the orchestrator's specification: it
//! expands a requested set of tasks into a dependency DAG
//! ([`GraphBuilder`]), gives every node a content-addressed [`TaskProxy::identity`],
//! mediates task execution through a pluggable [`ArtifactCache`], and drives
//! the whole thing to completion with an [`Executor`] bounded to a
//! configurable worker-pool width.
//!
//! It does not define a task DSL, a CLI, or an on-disk artifact layout --
//! those are left to the embedder. It does ship [`LocalArtifactCache`] and
//! [`kiln_vcs::GitInfluenceProvider`]-backed [`SourceTreeInfluence`] as
//! default, swappable implementations, since a build orchestrator that
//! can't run end to end isn't useful as a library.
//!
//! # Example
//!
//! ```no_run
//! use kiln_core::{
//!     BuildConfig, Environment, Executor, GraphBuilder, InMemoryTaskRegistry,
//!     InfluenceRegistry, LocalArtifactCache,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = InMemoryTaskRegistry::new();
//! // registry.register(Arc::new(my_task));
//!
//! let built = GraphBuilder::new(&registry).build(&["build".to_string()])?;
//!
//! let config = BuildConfig::default_resolved();
//! let cache = Arc::new(LocalArtifactCache::new(config.cache_dir));
//! let influence = Arc::new(InfluenceRegistry::new());
//! // Pass `Some(bus.sender())` instead of `None` to stream `KilnEvent`s to a
//! // CLI, TUI, or CI log renderer subscribed to the same `EventBus`.
//! let executor = Arc::new(Executor::new(cache, influence, Environment::inherited(), config.workers, None));
//!
//! let report = executor.run(&built).await;
//! assert!(report.all_succeeded() || !report.outcomes.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod influence;
pub mod proxy;
pub mod task;
pub mod tools;

pub use builder::{BuiltGraph, GraphBuilder};
pub use cache::{ArtifactCache, ArtifactHandle, BuildContextHandle, LocalArtifactCache, RemoteArtifactCache};
pub use config::BuildConfig;
pub use environment::Environment;
pub use error::{CacheError, Error, GraphError, IdentityError, InvariantError, Result, RunError};
pub use executor::{BuildReport, Executor, TaskOutcome};
pub use influence::{InfluenceProvider, InfluenceRegistry, SourceTreeInfluence};
pub use proxy::{State, TaskProxy};
pub use task::{InMemoryTaskRegistry, Task, TaskRegistry};
pub use tools::{CommandOutput, CwdScope, ProcessTools, Tools, ToolsError};

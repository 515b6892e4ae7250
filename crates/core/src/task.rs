//! The `Task` trait: the external, user-defined unit of work (spec §2, §4),
//! and the registry that resolves qualified names into tasks before graph
//! construction.

use crate::cache::ArtifactHandle;
use crate::tools::Tools;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A unit of work the build orchestrator can schedule. Implemented by the
/// embedder; `kiln-core` only ever sees tasks through this trait.
#[async_trait]
pub trait Task: Send + Sync {
    /// The task's fully-qualified, globally unique name.
    fn qualified_name(&self) -> &str;

    /// Names of tasks that must complete before this one can run.
    fn requires(&self) -> &[String] {
        &[]
    }

    /// The qualified name of the task this one extends, if any. An
    /// extension only ever runs as part of its host's sequence, never on
    /// its own (spec §4.3).
    fn extends(&self) -> Option<&str> {
        None
    }

    /// A workspace-relative path this task's identity should track via
    /// source-tree influence, if any (spec §5).
    fn source_path(&self) -> Option<&Path> {
        None
    }

    /// Whether this task's artifact is worth caching at all. A non-cacheable
    /// task still runs and still gets an identity, but the executor should
    /// not bother querying or publishing to the artifact cache for it.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// Whether this task only acquires an environment (e.g. a checked-out
    /// repository) rather than producing a transferable artifact. A
    /// `resource` task still participates in its dependents' identity, but
    /// is pruned from `TaskProxy::children()` beyond direct neighbors: a
    /// dependent two hops away through a resource doesn't also inherit that
    /// resource's own transitive dependencies (spec §3, invariant 6).
    fn is_resource(&self) -> bool {
        false
    }

    /// Bytes representing the task's own declared closure (its
    /// configuration, independent of source tree or registered influence
    /// providers) that feed directly into its identity hash.
    fn closure(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Execute the task's main body.
    ///
    /// # Errors
    ///
    /// Any error is wrapped in a `RunError` with `phase: "run"`.
    async fn run(&self, tools: &dyn Tools, context_dir: &Path) -> Result<(), BoxError>;

    /// Publish the task's resulting artifact, if it produces one.
    /// The default does nothing, for tasks with no cacheable output.
    ///
    /// # Errors
    ///
    /// Any error is wrapped in a `RunError` with `phase: "publish"`.
    async fn publish(&self, _tools: &dyn Tools, _artifact: &mut ArtifactHandle) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Resolves qualified names to tasks. Implemented by the embedder's task
/// source; `kiln-core` ships [`InMemoryTaskRegistry`] as the default.
pub trait TaskRegistry: Send + Sync {
    /// Look up a task by its qualified name.
    fn get(&self, qualified_name: &str) -> Option<Arc<dyn Task>>;

    /// Every qualified name known to this registry, in registration order.
    fn all_names(&self) -> Vec<String>;
}

/// A `TaskRegistry` backed by an in-memory map, populated ahead of time.
#[derive(Default)]
pub struct InMemoryTaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
    order: Vec<String>,
}

impl InMemoryTaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, keyed by its own `qualified_name`.
    ///
    /// # Panics
    ///
    /// Panics if a task with the same qualified name was already
    /// registered; this is a programming error in the embedder, not a
    /// recoverable build-time condition.
    pub fn register(&mut self, task: Arc<dyn Task>) {
        let name = task.qualified_name().to_string();
        assert!(
            !self.tasks.contains_key(&name),
            "duplicate task registration: {name:?}"
        );
        self.order.push(name.clone());
        self.tasks.insert(name, task);
    }
}

impl TaskRegistry for InMemoryTaskRegistry {
    fn get(&self, qualified_name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(qualified_name).cloned()
    }

    fn all_names(&self) -> Vec<String> {
        self.order.clone()
    }
}

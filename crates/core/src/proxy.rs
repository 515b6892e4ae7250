//! `TaskProxy`: the per-build wrapper around a [`Task`] that carries graph
//! wiring, memoized identity, and run state (spec §4, Design Notes §9).
//!
//! Edges are owned in one direction only, to avoid reference cycles: a
//! proxy owns `Arc` handles to its dependencies and its extensions (the
//! things that must exist before it can be dropped), while the reverse
//! edges -- ancestors, and an extension's host -- are `Weak`. An extension
//! and its host extend each other's lifetime through the *owning* edge
//! (host -> extension via `extensions`, dependent -> dependency via
//! `requires`), so the back-reference never needs to be strong.

use crate::error::InvariantError;
use crate::influence::InfluenceRegistry;
use crate::task::Task;
use sha1::{Digest, Sha1};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// A proxy's lifecycle state, transitioned exactly once forward except for
/// the terminal states, which are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not yet started.
    Pending,
    /// Currently executing `run`/`publish`.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Never ran because a dependency failed.
    Cancelled,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::Running,
            2 => State::Completed,
            3 => State::Failed,
            4 => State::Cancelled,
            _ => State::Pending,
        }
    }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;
const CANCELLED: u8 = 4;

/// The per-build wrapper around a user [`Task`].
pub struct TaskProxy {
    task: Arc<dyn Task>,
    requires: OnceLock<Vec<Arc<TaskProxy>>>,
    extensions: OnceLock<Vec<Arc<TaskProxy>>>,
    extended_task: OnceLock<Weak<TaskProxy>>,
    ancestors: Mutex<Vec<Weak<TaskProxy>>>,
    identity: OnceLock<String>,
    state: AtomicU8,
}

impl TaskProxy {
    /// Wrap a task. Graph edges are wired afterward by the builder via
    /// [`TaskProxy::set_requires`] / [`TaskProxy::set_extensions`] /
    /// [`TaskProxy::set_extended_task`] / [`TaskProxy::add_ancestor`], since
    /// a task's dependency proxies generally don't exist yet at this point.
    #[must_use]
    pub fn new(task: Arc<dyn Task>) -> Arc<Self> {
        Arc::new(Self {
            task,
            requires: OnceLock::new(),
            extensions: OnceLock::new(),
            extended_task: OnceLock::new(),
            ancestors: Mutex::new(Vec::new()),
            identity: OnceLock::new(),
            state: AtomicU8::new(PENDING),
        })
    }

    /// The wrapped task.
    #[must_use]
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// The wrapped task's qualified name.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        self.task.qualified_name()
    }

    /// Wire this proxy's dependency proxies, sorted by qualified name so
    /// identity hashing is deterministic regardless of registration order.
    ///
    /// Only the builder should call this, and only once per proxy.
    pub(crate) fn set_requires(&self, mut requires: Vec<Arc<TaskProxy>>) {
        requires.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        let _ = self.requires.set(requires);
    }

    /// Wire this proxy's extension proxies, sorted by qualified name.
    pub(crate) fn set_extensions(&self, mut extensions: Vec<Arc<TaskProxy>>) {
        extensions.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        let _ = self.extensions.set(extensions);
    }

    /// Record the host this proxy extends, if any.
    pub(crate) fn set_extended_task(&self, host: Weak<TaskProxy>) {
        let _ = self.extended_task.set(host);
    }

    /// Record a proxy that depends on this one, for cancellation propagation.
    pub(crate) fn add_ancestor(&self, ancestor: Weak<TaskProxy>) {
        self.ancestors.lock().unwrap_or_else(|e| e.into_inner()).push(ancestor);
    }

    /// This proxy's dependency proxies, sorted by qualified name.
    #[must_use]
    pub fn requires(&self) -> &[Arc<TaskProxy>] {
        self.requires.get().map_or(&[], Vec::as_slice)
    }

    /// This proxy's extension proxies, sorted by qualified name.
    #[must_use]
    pub fn extensions(&self) -> &[Arc<TaskProxy>] {
        self.extensions.get().map_or(&[], Vec::as_slice)
    }

    /// Direct plus transitive dependency proxies, sorted by qualified name,
    /// with `resource` nodes pruned once they stop being a direct neighbor
    /// (spec §3, invariant 6): a `resource` dependency is included when it is
    /// a direct `requires` edge of `self`, but the walk never descends past
    /// it to pull in its own dependencies a second time through some other
    /// path, since a resource is an acquire-only boundary, not a producer of
    /// further transitively-meaningful artifacts.
    ///
    /// This is an explicit, introspectable accessor matching the spec's
    /// `children` shape; `identity` does not consult it directly, since
    /// recursing through `requires()` and folding in each dependency's own
    /// memoized `identity` already transitively captures the same
    /// information without re-flattening the graph on every computation.
    #[must_use]
    pub fn children(&self) -> Vec<Arc<TaskProxy>> {
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut out = Vec::new();

        for direct in self.requires() {
            if seen.insert(direct.qualified_name().to_string()) {
                out.push(direct.clone());
            }
            if !direct.task().is_resource() {
                Self::collect_non_resource_descendants(direct, &mut seen, &mut out);
            }
        }

        out.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        out
    }

    fn collect_non_resource_descendants(
        node: &Arc<TaskProxy>,
        seen: &mut std::collections::HashSet<String>,
        out: &mut Vec<Arc<TaskProxy>>,
    ) {
        for dep in node.requires() {
            if dep.task().is_resource() {
                // A resource reached only transitively is excluded entirely,
                // and the walk does not continue past it.
                continue;
            }
            if seen.insert(dep.qualified_name().to_string()) {
                out.push(dep.clone());
            }
            Self::collect_non_resource_descendants(dep, seen, out);
        }
    }

    /// The host this proxy extends, if any and if it's still alive.
    #[must_use]
    pub fn extended_task(&self) -> Option<Arc<TaskProxy>> {
        self.extended_task.get().and_then(Weak::upgrade)
    }

    /// Proxies that depend on this one and are still alive.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Arc<TaskProxy>> {
        self.ancestors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::SeqCst))
    }

    /// Transition `Pending -> Running`. Returns `false` if the proxy was
    /// not pending (already claimed by a concurrent scheduling attempt).
    #[must_use]
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Transition `Running -> Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::ReCompletion`] if the proxy was not
    /// currently running.
    pub fn mark_completed(&self) -> Result<(), InvariantError> {
        self.state
            .compare_exchange(RUNNING, COMPLETED, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| InvariantError::ReCompletion {
                qualified_name: self.qualified_name().to_string(),
            })
    }

    /// Transition to `Failed` unconditionally.
    pub fn mark_failed(&self) {
        self.state.store(FAILED, Ordering::SeqCst);
    }

    /// Transition `Pending -> Cancelled`. Returns `false` if the proxy had
    /// already started running (too late to cancel).
    #[must_use]
    pub fn mark_cancelled(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Rejects running an extension outside its host's own run sequence
    /// (spec §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::ExtensionRunInIsolation`] if this proxy
    /// extends a host.
    pub fn ensure_not_extension(&self) -> Result<(), InvariantError> {
        if self.extended_task().is_some() {
            return Err(InvariantError::ExtensionRunInIsolation {
                qualified_name: self.qualified_name().to_string(),
            });
        }
        Ok(())
    }

    /// The proxy's memoized identity: a 40-character SHA-1 hex digest over
    /// the task's own closure, every applicable registered influence
    /// contribution, and the (name, identity) pairs of its dependencies and
    /// extensions, sorted for determinism.
    ///
    /// Computed lazily and cached; concurrent callers may race to compute
    /// it, but since every racer derives the same bytes, losing the race to
    /// store it is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::IdentityError`] if a registered provider
    /// fails for this task or any of its dependencies/extensions.
    pub fn identity(&self, influence: &InfluenceRegistry) -> Result<String, crate::error::IdentityError> {
        if let Some(id) = self.identity.get() {
            return Ok(id.clone());
        }

        let mut hasher = Sha1::new();
        hasher.update(self.qualified_name().as_bytes());
        hasher.update(self.task.closure());

        influence.apply_all(self.task.as_ref(), |name, bytes| {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(bytes);
        })?;

        let mut dep_ids = Vec::with_capacity(self.requires().len());
        for dep in self.requires() {
            dep_ids.push((dep.qualified_name().to_string(), dep.identity(influence)?));
        }
        dep_ids.sort();
        for (name, id) in &dep_ids {
            hasher.update(name.as_bytes());
            hasher.update(id.as_bytes());
        }

        let mut ext_ids = Vec::with_capacity(self.extensions().len());
        for ext in self.extensions() {
            ext_ids.push((ext.qualified_name().to_string(), ext.identity(influence)?));
        }
        ext_ids.sort();
        for (name, id) in &ext_ids {
            hasher.update(name.as_bytes());
            hasher.update(id.as_bytes());
        }

        let hex = hex::encode(hasher.finalize());
        let _ = self.identity.set(hex.clone());
        Ok(self.identity.get().cloned().unwrap_or(hex))
    }
}

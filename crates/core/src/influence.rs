//! Source-tree and ambient influence providers that feed a task's identity
//! hash (spec §4.1, §5).
//!
//! Modelled as an explicit field of [`crate::builder::BuildContext`] rather
//! than a lazily-initialized global: the registry is built once before graph
//! construction begins and is read-only for the remainder of the build, the
//! same shape the teacher uses for its environment-resolution chain rather
//! than a `once_cell`-backed singleton.

use crate::error::IdentityError;
use crate::task::Task;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One source of identity influence: a named contribution appended to a
/// task's identity hash, in addition to the task's own declared closure.
pub trait InfluenceProvider: Send + Sync {
    /// A stable name used in diagnostics and as part of `IdentityError`.
    fn name(&self) -> &str;

    /// Compute this provider's contribution for `task`. Returning `Ok(None)`
    /// means "not applicable to this task" and contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not determine its
    /// contribution (e.g. a git subprocess failed).
    fn influence(&self, task: &dyn Task) -> Result<Option<Vec<u8>>, BoxError>;
}

/// An ordered set of providers applied to every task during identity
/// computation. Order is significant: providers are applied in registration
/// order so identical registries always produce identical hashes.
#[derive(Default, Clone)]
pub struct InfluenceRegistry {
    providers: Vec<Arc<dyn InfluenceProvider>>,
}

impl InfluenceRegistry {
    /// An empty registry: tasks are influenced only by their own declared
    /// closure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Returns `self` for chained construction.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn InfluenceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Apply every registered provider to `task`, feeding each
    /// non-`None` contribution into `hasher` as `"{provider_name}:"` followed
    /// by the raw bytes, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] naming the first provider that failed.
    pub fn apply_all(
        &self,
        task: &dyn Task,
        mut feed: impl FnMut(&str, &[u8]),
    ) -> Result<(), IdentityError> {
        for provider in &self.providers {
            match provider.influence(task) {
                Ok(Some(bytes)) => feed(provider.name(), &bytes),
                Ok(None) => {}
                Err(source) => {
                    return Err(IdentityError {
                        provider: provider.name().to_string(),
                        qualified_name: task.qualified_name().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Adapts [`kiln_vcs::GitInfluenceProvider`] to [`InfluenceProvider`] for
/// tasks that declare a source-tree dependency (spec §5).
pub struct SourceTreeInfluence {
    git: kiln_vcs::GitInfluenceProvider,
    workspace_root: std::path::PathBuf,
}

impl SourceTreeInfluence {
    /// Build a provider rooted at `workspace_root`, the repository root used
    /// to resolve every task's declared relative source path.
    #[must_use]
    pub fn new(workspace_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            git: kiln_vcs::GitInfluenceProvider::new(),
            workspace_root: workspace_root.into(),
        }
    }
}

impl InfluenceProvider for SourceTreeInfluence {
    fn name(&self) -> &str {
        "source_tree"
    }

    fn influence(&self, task: &dyn Task) -> Result<Option<Vec<u8>>, BoxError> {
        let Some(relpath) = task.source_path() else {
            return Ok(None);
        };
        let value = self.git.source_tree_influence(&self.workspace_root, relpath)?;
        Ok(Some(value.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::StubTask;

    struct ConstantProvider(&'static str, &'static [u8]);

    impl InfluenceProvider for ConstantProvider {
        fn name(&self) -> &str {
            self.0
        }
        fn influence(&self, _task: &dyn Task) -> Result<Option<Vec<u8>>, BoxError> {
            Ok(Some(self.1.to_vec()))
        }
    }

    struct FailingProvider;

    impl InfluenceProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        fn influence(&self, _task: &dyn Task) -> Result<Option<Vec<u8>>, BoxError> {
            Err("boom".into())
        }
    }

    #[test]
    fn empty_registry_contributes_nothing() {
        let registry = InfluenceRegistry::new();
        let task = StubTask::new("demo");
        let mut seen = Vec::new();
        registry.apply_all(&task, |name, bytes| seen.push((name.to_string(), bytes.to_vec()))).unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn providers_apply_in_registration_order() {
        let registry = InfluenceRegistry::new()
            .with_provider(Arc::new(ConstantProvider("a", b"1")))
            .with_provider(Arc::new(ConstantProvider("b", b"2")));
        let task = StubTask::new("demo");
        let mut seen = Vec::new();
        registry.apply_all(&task, |name, bytes| seen.push((name.to_string(), bytes.to_vec()))).unwrap();
        assert_eq!(
            seen,
            vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())]
        );
    }

    #[test]
    fn a_failing_provider_surfaces_an_identity_error() {
        let registry = InfluenceRegistry::new().with_provider(Arc::new(FailingProvider));
        let task = StubTask::new("demo");
        let err = registry.apply_all(&task, |_, _| {}).unwrap_err();
        assert_eq!(err.provider, "failing");
        assert_eq!(err.qualified_name, "demo");
    }
}

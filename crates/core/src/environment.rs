//! Process-environment value used when invoking a task's subprocess.
//!
//! Deliberately small compared to a full CUE-schema environment layer
//! (secrets, per-variable access policies, capability sets): those belong to
//! the out-of-scope task-definition surface. This type only needs to make
//! `ProcessTools` directly runnable — a `HashMap`-backed overlay on the
//! ambient process environment, with PATH resolution and an optional
//! hermetic allow-list.

use std::collections::HashMap;
use std::path::PathBuf;

/// A process environment: the ambient environment plus explicit overrides,
/// and an optional allow-list that makes the overlay hermetic.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    overrides: HashMap<String, String>,
    /// When set, only these variable names (plus `overrides`) are passed to
    /// child processes — the ambient environment is otherwise suppressed.
    hermetic_allow: Option<Vec<String>>,
}

impl Environment {
    /// An environment with no overrides and no hermetic restriction:
    /// subprocesses inherit this process's environment verbatim.
    #[must_use]
    pub fn inherited() -> Self {
        Self::default()
    }

    /// Restrict the ambient environment to just the named variables (plus
    /// whatever is layered on with [`Environment::with_var`]).
    #[must_use]
    pub fn hermetic(allow: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            overrides: HashMap::new(),
            hermetic_allow: Some(allow.into_iter().map(Into::into).collect()),
        }
    }

    /// Layer a single variable on top, returning `self` for chaining.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// The full set of environment variables a subprocess should see:
    /// ambient (filtered by the hermetic allow-list, if any) plus overrides,
    /// with overrides taking precedence.
    #[must_use]
    pub fn resolve(&self) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = match &self.hermetic_allow {
            Some(allow) => std::env::vars()
                .filter(|(k, _)| allow.contains(k))
                .collect(),
            None => std::env::vars().collect(),
        };
        vars.extend(self.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    /// Whether this environment restricts subprocesses to an explicit
    /// allow-list rather than inheriting the full ambient environment.
    #[must_use]
    pub fn is_hermetic(&self) -> bool {
        self.hermetic_allow.is_some()
    }

    /// Locate an executable on `PATH` (as resolved by this environment,
    /// respecting a hermetic `PATH` override if one was layered on), the way
    /// a shell would.
    #[must_use]
    pub fn resolve_executable(&self, name: &str) -> Option<PathBuf> {
        let candidate = PathBuf::from(name);
        if candidate.is_absolute() || name.contains(std::path::MAIN_SEPARATOR) {
            return candidate.is_file().then_some(candidate);
        }

        let path_var = self.resolve().get("PATH").cloned()?;
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(name))
            .find(|p| p.is_file())
    }
}

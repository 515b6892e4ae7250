//! `BuildConfig`: user-facing scalar configuration (spec §3, §10.4).
//!
//! Resolution precedence mirrors the teacher's cache-root resolution order
//! in `cache/tasks.rs` (explicit override -> environment -> OS default),
//! narrowed to the handful of settings this crate actually needs: no CUE/TOML
//! schema, since task DSL syntax is out of scope for the core.

use std::num::NonZeroUsize;
use std::path::PathBuf;

const CACHE_DIR_VAR: &str = "KILN_CACHE_DIR";
const WORKERS_VAR: &str = "KILN_WORKERS";
const HERMETIC_VAR: &str = "KILN_HERMETIC";

/// Resolved build-wide configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root directory for the local artifact cache tier.
    pub cache_dir: PathBuf,
    /// Worker-pool width for the executor.
    pub workers: NonZeroUsize,
    /// Whether task subprocesses run with a hermetic (allow-listed)
    /// environment by default.
    pub hermetic: bool,
}

impl BuildConfig {
    /// Resolve configuration from explicit overrides, falling back to
    /// environment variables, falling back to built-in defaults.
    ///
    /// `cache_dir`/`workers`/`hermetic` overrides, when `Some`, always win.
    #[must_use]
    pub fn resolve(
        cache_dir: Option<PathBuf>,
        workers: Option<NonZeroUsize>,
        hermetic: Option<bool>,
    ) -> Self {
        Self {
            cache_dir: cache_dir
                .or_else(|| std::env::var_os(CACHE_DIR_VAR).map(PathBuf::from))
                .or_else(default_cache_dir)
                .unwrap_or_else(|| PathBuf::from(".kiln-cache")),
            workers: workers
                .or_else(|| {
                    std::env::var(WORKERS_VAR)
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .and_then(NonZeroUsize::new)
                })
                .or_else(|| std::thread::available_parallelism().ok())
                .unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            hermetic: hermetic
                .or_else(|| {
                    std::env::var(HERMETIC_VAR)
                        .ok()
                        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                })
                .unwrap_or(false),
        }
    }

    /// The defaults a library embedder gets with no overrides and no
    /// environment configured.
    #[must_use]
    pub fn default_resolved() -> Self {
        Self::resolve(None, None, None)
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("kiln"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins_over_everything() {
        let cfg = BuildConfig::resolve(
            Some(PathBuf::from("/explicit/cache")),
            NonZeroUsize::new(4),
            Some(true),
        );
        assert_eq!(cfg.cache_dir, PathBuf::from("/explicit/cache"));
        assert_eq!(cfg.workers.get(), 4);
        assert!(cfg.hermetic);
    }

    #[test]
    fn default_resolved_never_panics() {
        let cfg = BuildConfig::default_resolved();
        assert!(cfg.workers.get() >= 1);
    }
}

//! `Tools`: the scoped resource a task's `run`/`publish` callables use to
//! touch the outside world (spec §4.7, §6, Design Notes §9).
//!
//! Named only as an external interface in the distilled spec, but a crate
//! that cannot run end to end isn't useful as a library, so `kiln-core`
//! ships `ProcessTools` as the default implementation — a direct-subprocess
//! execution path in the spirit of the teacher's `HostBackend`, generalized
//! into the scoped-acquisition shape the design notes call for instead of a
//! single fire-and-forget call.

use crate::environment::Environment;
use async_trait::async_trait;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised by a `Tools` implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolsError {
    /// The working-directory stack is empty; `pop_cwd` was called without a
    /// matching `push_cwd` (a `kiln-core` bug, not user input).
    #[error("cwd stack underflow")]
    #[diagnostic(code(kiln::core::tools::cwd_underflow))]
    CwdUnderflow,

    /// Spawning or awaiting the subprocess failed.
    #[error("failed to run `{program}`")]
    #[diagnostic(code(kiln::core::tools::spawn))]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess ran but exited with a non-zero status.
    #[error("`{program}` exited with status {status}")]
    #[diagnostic(code(kiln::core::tools::nonzero_exit))]
    NonZeroExit {
        /// The program that failed.
        program: String,
        /// Its exit status.
        status: std::process::ExitStatus,
    },
}

/// Output captured from a subprocess run through [`Tools::run`].
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit status.
    pub status: std::process::ExitStatus,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

/// The scoped resource a `Task::run`/`Task::publish` callable is given.
/// `cwd`/environment mutation/subprocess invocation are themselves scoped:
/// the outer acquisition (one per `TaskProxy::run`) owns any temporary
/// workspace and releases it on every exit path, success or failure.
#[async_trait]
pub trait Tools: Send + Sync {
    /// Push a directory onto the cwd stack; subsequent `run` calls execute
    /// there until [`Tools::pop_cwd`] (or the guard equivalent in a richer
    /// implementation) restores the previous one.
    fn push_cwd(&self, path: PathBuf);

    /// Restore the previous working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ToolsError::CwdUnderflow`] if called without a matching push.
    fn pop_cwd(&self) -> Result<(), ToolsError>;

    /// The directory a subprocess run right now would execute in.
    fn current_dir(&self) -> PathBuf;

    /// Layer an environment variable on top of the ambient environment for
    /// the remainder of this scope.
    fn set_env(&self, key: String, value: String);

    /// Run a subprocess to completion in the current directory/environment.
    ///
    /// # Errors
    ///
    /// Returns [`ToolsError::Spawn`] if the process could not be started, or
    /// [`ToolsError::NonZeroExit`] if it exited non-zero.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ToolsError>;
}

/// A `cwd` scope that restores the previous directory on drop, regardless
/// of whether the enclosed code path returned normally, via `?`, or
/// unwound through a panic.
pub struct CwdScope<'a> {
    tools: &'a dyn Tools,
}

impl<'a> CwdScope<'a> {
    /// Push `path` and return a guard that pops it back on drop.
    pub fn enter(tools: &'a dyn Tools, path: PathBuf) -> Self {
        tools.push_cwd(path);
        Self { tools }
    }
}

impl Drop for CwdScope<'_> {
    fn drop(&mut self) {
        // A pop failing here means the stack was already unwound by
        // something else (e.g. a nested scope popped out of order); that is
        // a logic bug, but panicking inside Drop during an existing unwind
        // would abort, so this is the one place we only log.
        if self.tools.pop_cwd().is_err() {
            tracing::warn!("cwd scope popped an already-empty stack");
        }
    }
}

/// Default, directly-runnable `Tools` implementation: shells out via
/// `tokio::process::Command`, scoped to a per-task temporary workspace.
pub struct ProcessTools {
    root: tempfile::TempDir,
    cwd_stack: Mutex<Vec<PathBuf>>,
    base_environment: Environment,
    overlay: Mutex<Vec<(String, String)>>,
}

impl ProcessTools {
    /// Acquire a fresh scoped workspace. The temporary directory (and
    /// everything under it) is removed when the returned value is dropped.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a temporary directory could not be created.
    pub fn acquire(base_environment: Environment) -> std::io::Result<Self> {
        let root = tempfile::tempdir()?;
        Ok(Self {
            root,
            cwd_stack: Mutex::new(Vec::new()),
            base_environment,
            overlay: Mutex::new(Vec::new()),
        })
    }

    /// The root of this task's scoped temporary workspace.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        self.root.path()
    }
}

#[async_trait]
impl Tools for ProcessTools {
    fn push_cwd(&self, path: PathBuf) {
        self.cwd_stack.lock().unwrap_or_else(|e| e.into_inner()).push(path);
    }

    fn pop_cwd(&self) -> Result<(), ToolsError> {
        self.cwd_stack
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .map(|_| ())
            .ok_or(ToolsError::CwdUnderflow)
    }

    fn current_dir(&self) -> PathBuf {
        self.cwd_stack
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.path().to_path_buf())
    }

    fn set_env(&self, key: String, value: String) {
        self.overlay.lock().unwrap_or_else(|e| e.into_inner()).push((key, value));
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ToolsError> {
        let mut env = self.base_environment.clone();
        for (k, v) in self.overlay.lock().unwrap_or_else(|e| e.into_inner()).iter() {
            env = env.clone().with_var(k.clone(), v.clone());
        }

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(self.current_dir())
            .env_clear()
            .envs(env.resolve());

        let output = command
            .output()
            .await
            .map_err(|source| ToolsError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolsError::NonZeroExit {
                program: program.to_string(),
                status: output.status,
            });
        }

        Ok(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

//! `Executor`: runs a [`BuiltGraph`] to completion, scheduling proxies as
//! their dependencies finish, bounded by a worker pool, with cooperative
//! cancellation of a failed task's ancestors (spec §4.5, §6).

use crate::builder::BuiltGraph;
use crate::cache::ArtifactCache;
use crate::environment::Environment;
use crate::error::{CacheError, Error, RunError};
use crate::influence::InfluenceRegistry;
use crate::proxy::TaskProxy;
use crate::tools::ProcessTools;
use kiln_events::{EventCategory, EventSender, EventSource, KilnEvent, SystemEvent, TaskEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{OnceCell, Semaphore};

/// `EventSource::target` stamped on every [`KilnEvent`] the executor emits.
const EVENT_SOURCE: &str = "kiln::executor";

type TaskResult = Result<(), Arc<Error>>;

/// Per-task outcome returned once the whole build finishes.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// The task's qualified name.
    pub qualified_name: String,
    /// `Ok(())` if it completed, otherwise the failure or cancellation cause.
    pub result: Result<(), Arc<Error>>,
}

/// The result of running a whole build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// One entry per proxy reached during execution, including cancelled ones.
    pub outcomes: Vec<TaskOutcome>,
}

impl BuildReport {
    /// Whether every task in the report completed successfully.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Drives a [`BuiltGraph`] to completion.
pub struct Executor {
    cache: Arc<dyn ArtifactCache>,
    influence: Arc<InfluenceRegistry>,
    base_environment: Environment,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    cells: Mutex<HashMap<String, Arc<OnceCell<TaskResult>>>>,
    events: Option<EventSender>,
}

impl Executor {
    /// Build an executor bounded to `workers` concurrent task runs.
    ///
    /// `events`, when given, receives a [`KilnEvent`] for every state
    /// transition a proxy goes through (spec §2) -- a CLI, TUI, or CI log
    /// renderer subscribes to the same `EventBus` to follow the build live.
    /// Pass `None` to run without an event sink.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ArtifactCache>,
        influence: Arc<InfluenceRegistry>,
        base_environment: Environment,
        workers: std::num::NonZeroUsize,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            cache,
            influence,
            base_environment,
            semaphore: Arc::new(Semaphore::new(workers.get())),
            cancelled: Arc::new(AtomicBool::new(false)),
            cells: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, category: EventCategory) {
        if let Some(sender) = &self.events {
            let event = KilnEvent::new(
                kiln_events::correlation_id(),
                EventSource::new(EVENT_SOURCE),
                category,
            );
            let _ = sender.send(event);
        }
    }

    /// Request that the build stop launching new work. Tasks already
    /// running are left to finish; anything still pending is cancelled.
    pub fn request_cancellation(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.emit(EventCategory::System(SystemEvent::SupervisorLog {
            tag: "executor".to_string(),
            message: "cancellation requested".to_string(),
        }));
    }

    fn cell_for(&self, qualified_name: &str) -> Arc<OnceCell<TaskResult>> {
        self.cells
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(qualified_name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Run every root in `graph`, and transitively everything they depend
    /// on, to completion.
    pub async fn run(self: &Arc<Self>, graph: &BuiltGraph) -> BuildReport {
        let roots = graph.roots();
        let mut join_set = tokio::task::JoinSet::new();
        for root in roots {
            let executor = self.clone();
            join_set.spawn(async move { executor.execute(root).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((name, result)) = joined {
                outcomes.push(TaskOutcome {
                    qualified_name: name,
                    result,
                });
            }
        }
        BuildReport { outcomes }
    }

    fn execute(
        self: &Arc<Self>,
        proxy: Arc<TaskProxy>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = (String, TaskResult)> + Send>> {
        let executor = self.clone();
        Box::pin(async move {
            let name = proxy.qualified_name().to_string();
            let cell = executor.cell_for(&name);
            let result = cell
                .get_or_init(|| async { executor.execute_inner(proxy).await })
                .await
                .clone();
            (name, result)
        })
    }

    async fn execute_inner(self: &Arc<Self>, proxy: Arc<TaskProxy>) -> TaskResult {
        let mut dependency_futures = Vec::with_capacity(proxy.requires().len());
        for dep in proxy.requires() {
            let executor = self.clone();
            let dep = dep.clone();
            dependency_futures.push(tokio::spawn(async move { executor.execute(dep).await }));
        }
        let mut first_failure: Option<Arc<Error>> = None;
        for fut in dependency_futures {
            if let Ok((_, Err(cause))) = fut.await {
                if first_failure.is_none() {
                    first_failure = Some(cause);
                }
            }
        }

        if let Some(cause) = first_failure {
            proxy.mark_cancelled();
            return Err(Arc::new(Error::Cancelled {
                qualified_name: proxy.qualified_name().to_string(),
                cause,
            }));
        }

        if self.cancelled.load(Ordering::SeqCst) {
            proxy.mark_cancelled();
            return Err(Arc::new(Error::Cancelled {
                qualified_name: proxy.qualified_name().to_string(),
                cause: Arc::new(Error::Run(RunError {
                    qualified_name: proxy.qualified_name().to_string(),
                    phase: "cancelled",
                    source: "build was cancelled".into(),
                })),
            }));
        }

        let identity = match proxy.identity(&self.influence) {
            Ok(id) => id,
            Err(source) => return Err(Arc::new(Error::Identity(source))),
        };

        // `is_cached` (spec §4.4): the host's own artifact is not enough --
        // every extension must also already be available, or there is
        // nothing to download for them and the whole run (host + extensions)
        // must go through `run_and_publish` instead. A non-cacheable task
        // never short-circuits here: it always runs.
        let mut fully_cached = proxy.task().is_cacheable() && self.cache.is_available(&identity, true).await;
        let mut extension_identities = Vec::with_capacity(proxy.extensions().len());
        for extension in proxy.extensions() {
            let ext_identity = match extension.identity(&self.influence) {
                Ok(id) => id,
                Err(source) => return Err(Arc::new(Error::Identity(source))),
            };
            fully_cached = fully_cached
                && extension.task().is_cacheable()
                && self.cache.is_available(&ext_identity, true).await;
            extension_identities.push(ext_identity);
        }

        if fully_cached {
            let mut download_failed = false;
            for id in std::iter::once(&identity).chain(&extension_identities) {
                if self.cache.is_available_locally(id).await {
                    continue;
                }
                if let Err(e) = self.cache.download(id).await {
                    tracing::warn!(task = %proxy.qualified_name(), error = %e, "cache download failed, falling back to a local build");
                    download_failed = true;
                    break;
                }
            }
            if !download_failed {
                self.emit(EventCategory::Task(TaskEvent::CacheHit {
                    name: proxy.qualified_name().to_string(),
                    cache_key: identity.clone(),
                }));
                let _ = proxy.mark_completed();
                return Ok(());
            }
        }

        let _permit = self.semaphore.acquire().await.expect("semaphore not closed");

        if !proxy.try_start() {
            // Lost a race to a concurrent caller that already claimed this
            // proxy via the same result cell; wait isn't needed since the
            // cell itself serializes callers onto the same future.
        }

        self.emit(EventCategory::Task(TaskEvent::CacheMiss {
            name: proxy.qualified_name().to_string(),
        }));
        self.emit(EventCategory::Task(TaskEvent::Started {
            name: proxy.qualified_name().to_string(),
            command: proxy.qualified_name().to_string(),
            hermetic: self.base_environment.is_hermetic(),
        }));

        let started = Instant::now();
        let outcome = self.run_and_publish(&proxy, &identity).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(()) => {
                self.emit(EventCategory::Task(TaskEvent::Completed {
                    name: proxy.qualified_name().to_string(),
                    success: true,
                    exit_code: None,
                    duration_ms,
                }));
                let _ = proxy.mark_completed();
                Ok(())
            }
            Err(err) => {
                self.emit(EventCategory::Task(TaskEvent::Completed {
                    name: proxy.qualified_name().to_string(),
                    success: false,
                    exit_code: None,
                    duration_ms,
                }));
                proxy.mark_failed();
                let _ = self.cache.discard_local(&identity).await;
                Err(Arc::new(err))
            }
        }
    }

    async fn run_and_publish(self: &Arc<Self>, proxy: &Arc<TaskProxy>, identity: &str) -> Result<(), Error> {
        let tools = ProcessTools::acquire(self.base_environment.clone())
            .map_err(|source| {
                Error::Run(RunError {
                    qualified_name: proxy.qualified_name().to_string(),
                    phase: "acquire_tools",
                    source: Box::new(source),
                })
            })?;
        let context = self
            .cache
            .get_context(identity)
            .await
            .map_err(Error::Cache)?;

        // Host first: run, publish, commit, upload -- strictly before any
        // extension is touched (spec §4.3/§4.4, "Extension ordering":
        // `H.run finish < e1.run start`).
        proxy
            .task()
            .run(&tools, context.path())
            .await
            .map_err(|source| {
                Error::Run(RunError {
                    qualified_name: proxy.qualified_name().to_string(),
                    phase: "run",
                    source,
                })
            })?;

        if proxy.task().is_cacheable() {
            let mut handle = self
                .cache
                .get_artifact(identity)
                .await
                .map_err(Error::Cache)?;
            proxy
                .task()
                .publish(&tools, &mut handle)
                .await
                .map_err(|source| {
                    Error::Run(RunError {
                        qualified_name: proxy.qualified_name().to_string(),
                        phase: "publish",
                        source,
                    })
                })?;
            self.cache.commit(handle).await.map_err(Error::Cache)?;
            self.cache
                .upload(identity, false)
                .await
                .map_err(|e| Error::Cache(CacheError::UploadFailed {
                    qualified_name: proxy.qualified_name().to_string(),
                    source: e.to_string().into(),
                }))?;
        }

        // Extensions run strictly after the host's primary publish and
        // strictly before the host is considered finished, in declaration
        // order (they were sorted by qualified name when wired). An
        // extension's own `requires` were re-parented onto the host at graph
        // build time (spec §4.3 step 3), so they were already awaited as
        // part of this host's dependency wait, before `run_and_publish` was
        // ever called.
        for extension in proxy.extensions() {
            extension
                .task()
                .run(&tools, context.path())
                .await
                .map_err(|source| {
                    Error::Run(RunError {
                        qualified_name: extension.qualified_name().to_string(),
                        phase: "run",
                        source,
                    })
                })?;

            if extension.task().is_cacheable() {
                let extension_identity = extension
                    .identity(&self.influence)
                    .map_err(Error::Identity)?;
                let mut handle = self
                    .cache
                    .get_artifact(&extension_identity)
                    .await
                    .map_err(Error::Cache)?;
                extension
                    .task()
                    .publish(&tools, &mut handle)
                    .await
                    .map_err(|source| {
                        Error::Run(RunError {
                            qualified_name: extension.qualified_name().to_string(),
                            phase: "publish",
                            source,
                        })
                    })?;
                self.cache.commit(handle).await.map_err(Error::Cache)?;
                self.cache
                    .upload(&extension_identity, false)
                    .await
                    .map_err(|e| Error::Cache(CacheError::UploadFailed {
                        qualified_name: extension.qualified_name().to_string(),
                        source: e.to_string().into(),
                    }))?;
            }
        }

        Ok(())
    }
}

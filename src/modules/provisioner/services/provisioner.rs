use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use super::backend::{BackendResource, DependencyBackend};
use crate::config::{connect_any, ProvisionerConfig};
use crate::core::{HarnessError, Result};
use crate::modules::provisioner::models::{
    ConnectionDescriptor, DependencyKind, DependencySpec, LifecycleState, ProvisionedDependency,
};

/// Owns every ephemeral dependency of a suite run
///
/// All starts are bounded by `config.timeout`; an elapsed bound becomes a
/// `Provisioning` error. Retries only happen when `max_retries > 0`.
///
/// Backend starts run in their own tasks. A start whose caller timed out or
/// was cancelled stops its resource as soon as it finishes, and
/// [`release_all`](Self::release_all) waits for those stragglers.
pub struct DependencyProvisioner {
    backend: Arc<dyn DependencyBackend>,
    config: ProvisionerConfig,
    dependencies: Mutex<HashMap<Uuid, ProvisionedDependency>>,
    starts: Mutex<Vec<JoinHandle<()>>>,
}

impl DependencyProvisioner {
    pub fn new(backend: Arc<dyn DependencyBackend>, config: ProvisionerConfig) -> Self {
        Self {
            backend,
            config,
            dependencies: Mutex::new(HashMap::new()),
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Start a dependency and return its connection descriptor
    ///
    /// # Errors
    /// `Provisioning` if the backend fails or does not become ready within
    /// the configured timeout on every allowed attempt.
    pub async fn acquire(
        &self,
        kind: DependencyKind,
        spec: &DependencySpec,
    ) -> Result<ConnectionDescriptor> {
        if !self.backend.supports(kind) {
            return Err(HarnessError::Provisioning(format!(
                "Backend '{}' cannot provide {}",
                self.backend.name(),
                kind
            )));
        }

        let attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.start_once(kind).await {
                Ok(resource) => return self.register_and_bootstrap(kind, resource, spec).await,
                Err(e) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        attempt,
                        attempts,
                        error = %e,
                        "Dependency failed to start"
                    );
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                sleep(self.config.retry_backoff).await;
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(HarnessError::Provisioning(format!(
            "{} via '{}' failed after {} attempt(s): {}",
            kind,
            self.backend.name(),
            attempts,
            cause
        )))
    }

    async fn start_once(&self, kind: DependencyKind) -> Result<BackendResource> {
        let (tx, rx) = oneshot::channel();
        let backend = self.backend.clone();
        let task = tokio::spawn(async move {
            let started = backend.start(kind).await;
            // The receiver is gone when the waiter timed out or was dropped
            if let Err(Ok(resource)) = tx.send(started) {
                stop_abandoned(backend.as_ref(), kind, resource).await;
            }
        });
        self.track_start(task);

        match timeout(self.config.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HarnessError::Provisioning(format!(
                "{} start was aborted",
                kind
            ))),
            Err(_) => Err(HarnessError::Provisioning(format!(
                "{} did not become ready within {:?}",
                kind, self.config.timeout
            ))),
        }
    }

    fn track_start(&self, task: JoinHandle<()>) {
        let mut starts = self
            .starts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        starts.retain(|task| !task.is_finished());
        starts.push(task);
    }

    /// Wait for starts nobody is waiting on any more, so their resources get stopped
    async fn settle_starts(&self) {
        let starts = std::mem::take(
            &mut *self
                .starts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        for mut task in starts {
            if timeout(self.config.timeout, &mut task).await.is_err() {
                tracing::warn!(
                    backend = self.backend.name(),
                    "Abandoned start still running, aborting"
                );
                task.abort();
            }
        }
    }

    async fn register_and_bootstrap(
        &self,
        kind: DependencyKind,
        resource: BackendResource,
        spec: &DependencySpec,
    ) -> Result<ConnectionDescriptor> {
        let descriptor = ConnectionDescriptor {
            id: Uuid::new_v4(),
            kind,
            url: resource.url,
            resource: resource.resource,
        };
        self.lock()
            .insert(descriptor.id, ProvisionedDependency::starting(descriptor.clone()));

        if !spec.bootstrap_sql.is_empty() {
            let bootstrap = timeout(self.config.timeout, bootstrap(&descriptor.url, spec)).await;
            let failure = match bootstrap {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("bootstrap exceeded {:?}", self.config.timeout)),
            };

            if let Some(cause) = failure {
                if let Err(e) = self.release(&descriptor).await {
                    tracing::error!(dependency = %descriptor.id, error = %e, "Cleanup after failed bootstrap failed");
                }
                return Err(HarnessError::Provisioning(format!(
                    "Schema bootstrap for {} failed: {}",
                    descriptor.resource, cause
                )));
            }
        }

        self.set_state(descriptor.id, LifecycleState::Ready);
        tracing::info!(
            dependency = %descriptor.id,
            backend = self.backend.name(),
            resource = %descriptor.resource,
            "Dependency ready"
        );

        Ok(descriptor)
    }

    /// Stop a dependency. Releasing an unknown or already stopped dependency is a no-op.
    pub async fn release(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        // Claim the dependency first so concurrent releases stop it only once
        let previous = {
            let mut dependencies = self.lock();
            match dependencies.get_mut(&descriptor.id) {
                Some(dependency) if dependency.is_live() => {
                    let previous = dependency.state;
                    dependency.state = LifecycleState::Stopped;
                    dependency.released_at = Some(Utc::now());
                    previous
                }
                _ => {
                    tracing::debug!(dependency = %descriptor.id, "Release skipped, not live");
                    return Ok(());
                }
            }
        };

        if let Err(e) = self.backend.stop(descriptor).await {
            if let Some(dependency) = self.lock().get_mut(&descriptor.id) {
                dependency.state = previous;
                dependency.released_at = None;
            }
            return Err(HarnessError::Provisioning(format!(
                "Failed to release {}: {}",
                descriptor.resource, e
            )));
        }

        tracing::info!(dependency = %descriptor.id, resource = %descriptor.resource, "Dependency released");
        Ok(())
    }

    /// Release every live dependency, returning the first failure after trying all.
    ///
    /// Starts still in flight are awaited first; their resources are stopped
    /// by the start task itself.
    pub async fn release_all(&self) -> Result<()> {
        self.settle_starts().await;

        let live: Vec<ConnectionDescriptor> = self
            .lock()
            .values()
            .filter(|d| d.is_live())
            .map(|d| d.descriptor.clone())
            .collect();

        let mut first_error = None;
        for descriptor in &live {
            if let Err(e) = self.release(descriptor).await {
                tracing::error!(dependency = %descriptor.id, error = %e, "Release failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `f` with a freshly acquired dependency, releasing it on every exit path.
    ///
    /// A panic inside `f` is re-raised after the release.
    pub async fn scoped<F, Fut, T>(
        &self,
        kind: DependencyKind,
        spec: &DependencySpec,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(ConnectionDescriptor) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let descriptor = self.acquire(kind, spec).await?;
        let outcome = AssertUnwindSafe(f(descriptor.clone())).catch_unwind().await;
        let released = self.release(&descriptor).await;

        match outcome {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(Err(e)) => {
                if let Err(release_error) = released {
                    tracing::error!(error = %release_error, "Release after failed scope failed");
                }
                Err(e)
            }
            Ok(Ok(value)) => {
                released?;
                Ok(value)
            }
        }
    }

    pub fn state(&self, id: Uuid) -> Option<LifecycleState> {
        self.lock().get(&id).map(|d| d.state)
    }

    /// Number of dependencies not yet stopped
    pub fn live_count(&self) -> usize {
        self.lock().values().filter(|d| d.is_live()).count()
    }

    fn set_state(&self, id: Uuid, state: LifecycleState) {
        if let Some(dependency) = self.lock().get_mut(&id) {
            dependency.state = state;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ProvisionedDependency>> {
        // The map stays consistent even if a holder panicked
        self.dependencies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn stop_abandoned(
    backend: &dyn DependencyBackend,
    kind: DependencyKind,
    resource: BackendResource,
) {
    let descriptor = ConnectionDescriptor {
        id: Uuid::new_v4(),
        kind,
        url: resource.url,
        resource: resource.resource,
    };
    match backend.stop(&descriptor).await {
        Ok(()) => tracing::info!(resource = %descriptor.resource, "Abandoned dependency stopped"),
        Err(e) => tracing::error!(
            resource = %descriptor.resource,
            error = %e,
            "Failed to stop abandoned dependency"
        ),
    }
}

async fn bootstrap(url: &str, spec: &DependencySpec) -> Result<()> {
    let pool = connect_any(url).await?;
    for statement in &spec.bootstrap_sql {
        sqlx::query(statement).execute(&pool).await?;
    }
    pool.close().await;
    Ok(())
}

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use futures_util::{stream, FutureExt, StreamExt};
use tokio::time::timeout;
use uuid::Uuid;

use super::assertions::{
    assert_interaction, assert_json_field, assert_no_unmatched, assert_scalar, assert_status,
};
use super::subject::{CaseEnvironment, Subject};
use crate::config::{connect_any, IsolationPolicy, MockServerConfig, OrchestratorConfig};
use crate::core::{HarnessError, Result};
use crate::modules::mock_upstream::MockUpstreamServer;
use crate::modules::orchestrator::models::{
    AssertionOutcome, CaseFailure, CaseReport, CaseStatus, Stage, SuiteReport, TestCase,
};
use crate::modules::provisioner::{
    ConnectionDescriptor, DependencyKind, DependencyProvisioner, DependencySpec,
};

/// Runs test cases against a subject with ephemeral dependencies.
///
/// Each case follows a fixed protocol: provision, stub, invoke, check
/// response, check persisted state, check upstream interactions. The first
/// failed check ends the case; the suite always runs every case.
pub struct TestOrchestrator {
    provisioner: Arc<DependencyProvisioner>,
    subject: Arc<dyn Subject>,
    config: OrchestratorConfig,
    mock_config: MockServerConfig,
    dependency: DependencySpec,
    shared: tokio::sync::Mutex<Option<ConnectionDescriptor>>,
}

impl TestOrchestrator {
    /// # Errors
    /// `Configuration` if `config` is invalid (see [`OrchestratorConfig::validate`])
    pub fn new(
        provisioner: Arc<DependencyProvisioner>,
        subject: Arc<dyn Subject>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provisioner,
            subject,
            config,
            mock_config: MockServerConfig::default(),
            dependency: DependencySpec::default(),
            shared: tokio::sync::Mutex::new(None),
        })
    }

    pub fn with_mock_config(mut self, mock_config: MockServerConfig) -> Self {
        self.mock_config = mock_config;
        self
    }

    /// Schema and other setup applied to every provisioned database
    pub fn with_dependency(mut self, dependency: DependencySpec) -> Self {
        self.dependency = dependency;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every case, then release suite-level dependencies
    pub async fn run_suite(&self, suite: &str, cases: &[TestCase]) -> SuiteReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        tracing::info!(
            suite,
            run_id = %run_id,
            cases = cases.len(),
            subject = self.subject.name(),
            backend = self.provisioner.backend_name(),
            isolation = %self.config.isolation,
            concurrency = self.config.concurrency,
            "Suite started"
        );

        let reports: Vec<CaseReport> = if self.config.concurrency <= 1 {
            let mut reports = Vec::with_capacity(cases.len());
            for case in cases {
                reports.push(self.run_case(case).await);
            }
            reports
        } else {
            stream::iter(cases)
                .map(|case| self.run_case(case))
                .buffered(self.config.concurrency)
                .collect()
                .await
        };

        let mut teardown_errors = self.teardown_shared().await;
        // Anything a cancelled case left behind
        if let Err(e) = self.provisioner.release_all().await {
            teardown_errors.push(e.to_string());
        }
        let report = SuiteReport::new(suite, run_id, started_at, reports, teardown_errors);

        tracing::info!(
            suite,
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed,
            errors = report.summary.errors,
            duration_ms = report.duration_ms,
            "Suite finished"
        );

        report
    }

    /// Run one case. Teardown runs on every path: pass, failure, error, panic or timeout.
    pub async fn run_case(&self, case: &TestCase) -> CaseReport {
        let clock = Instant::now();
        let scope = CaseScope::default();
        tracing::info!(case = %case.name, "Case started");

        let body = AssertUnwindSafe(self.execute(case, &scope)).catch_unwind();
        let (result, cancelled) = match timeout(self.config.case_timeout, body).await {
            Ok(Ok(result)) => (result, false),
            Ok(Err(panic)) => (
                Err(HarnessError::Subject(format!(
                    "panicked: {}",
                    panic_message(panic.as_ref())
                ))),
                true,
            ),
            Err(_) => (
                Err(HarnessError::timeout(
                    format!("case '{}'", case.name),
                    self.config.case_timeout,
                )),
                true,
            ),
        };

        let stage = scope.stage();
        let teardown_errors = self.teardown_case(&scope, cancelled).await;

        let (status, failure) = match result {
            Ok(()) if teardown_errors.is_empty() => (CaseStatus::Passed, None),
            Ok(()) => (
                CaseStatus::Error,
                Some(CaseFailure {
                    stage: Stage::Teardown,
                    kind: "provisioning".to_string(),
                    message: teardown_errors.join("; "),
                }),
            ),
            Err(e) => {
                let status = if e.is_test_failure() {
                    CaseStatus::Failed
                } else {
                    CaseStatus::Error
                };
                (status, Some(CaseFailure::from_error(stage, &e)))
            }
        };

        let report = CaseReport {
            name: case.name.clone(),
            status,
            outcomes: scope.take_outcomes(),
            failure,
            teardown_errors,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        match &report.failure {
            None => tracing::info!(case = %case.name, duration_ms = report.duration_ms, "Case passed"),
            Some(failure) => tracing::warn!(
                case = %case.name,
                status = ?report.status,
                stage = %failure.stage,
                kind = %failure.kind,
                message = %failure.message,
                "Case did not pass"
            ),
        }

        report
    }

    async fn execute(&self, case: &TestCase, scope: &CaseScope) -> Result<()> {
        scope.enter(Stage::Provision);
        let database = match self.config.isolation {
            IsolationPolicy::SharedInstance => self.shared_dependency().await?,
            IsolationPolicy::PerCaseInstance => {
                let descriptor = self
                    .provisioner
                    .acquire(DependencyKind::RelationalStore, &self.dependency)
                    .await?;
                scope.track_dependency(descriptor.clone());
                descriptor
            }
        };

        scope.enter(Stage::Stub);
        let server = Arc::new(MockUpstreamServer::start_with(&self.mock_config).await?);
        scope.track_server(server.clone());
        server.reset();
        for stub in &case.stubs {
            server.register_stub(stub.matcher.clone(), stub.response.clone());
        }

        scope.enter(Stage::Invoke);
        let env = CaseEnvironment {
            case_name: case.name.clone(),
            database: database.clone(),
            upstream_uri: server.uri(),
        };
        let response = self.subject.invoke(&env, &case.request).await?;
        tracing::debug!(case = %case.name, status = response.status, "Subject responded");

        scope.enter(Stage::Response);
        if let Some(status) = case.response.status {
            scope.record(assert_status(status, &response))?;
        }
        for (pointer, expected) in &case.response.json_fields {
            scope.record(assert_json_field(pointer, expected, &response))?;
        }

        scope.enter(Stage::PersistedState);
        if !case.state.is_empty() {
            let pool = connect_any(&database.url).await?;
            let checked = async {
                for expectation in &case.state {
                    let outcome = assert_scalar(&pool, expectation).await?;
                    scope.record(outcome)?;
                }
                Ok::<(), HarnessError>(())
            }
            .await;
            pool.close().await;
            checked?;
        }

        scope.enter(Stage::Interactions);
        for expectation in &case.interactions {
            scope.record(assert_interaction(&server, expectation))?;
        }
        if !case.allow_unmatched {
            scope.record_as(assert_no_unmatched(&server), HarnessError::StubMismatch)?;
        }

        Ok(())
    }

    async fn shared_dependency(&self) -> Result<ConnectionDescriptor> {
        let mut shared = self.shared.lock().await;
        if let Some(descriptor) = shared.as_ref() {
            return Ok(descriptor.clone());
        }

        let descriptor = self
            .provisioner
            .acquire(DependencyKind::RelationalStore, &self.dependency)
            .await?;
        *shared = Some(descriptor.clone());
        Ok(descriptor)
    }

    /// `cancelled` cases may still have upstream calls in flight; those are dropped
    async fn teardown_case(&self, scope: &CaseScope, cancelled: bool) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(server) = scope.take_server() {
            server.reset();
            let stopped = if cancelled {
                timeout(self.config.case_timeout, server.abort()).await
            } else {
                timeout(self.config.case_timeout, server.stop()).await
            };
            match stopped {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(format!("mock upstream: {}", e)),
                Err(_) => errors.push("mock upstream: stop timed out".to_string()),
            }
        }

        for descriptor in scope.take_dependencies() {
            match timeout(self.config.case_timeout, self.provisioner.release(&descriptor)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e.to_string()),
                Err(_) => errors.push(format!("release of {} timed out", descriptor.resource)),
            }
        }

        errors
    }

    async fn teardown_shared(&self) -> Vec<String> {
        let shared = self.shared.lock().await.take();
        let Some(descriptor) = shared else {
            return Vec::new();
        };

        match self.provisioner.release(&descriptor).await {
            Ok(()) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }
}

/// Resources and results of one case, owned outside the cancellable case body
struct CaseScope {
    stage: Mutex<Stage>,
    dependencies: Mutex<Vec<ConnectionDescriptor>>,
    server: Mutex<Option<Arc<MockUpstreamServer>>>,
    outcomes: Mutex<Vec<AssertionOutcome>>,
}

impl Default for CaseScope {
    fn default() -> Self {
        Self {
            stage: Mutex::new(Stage::Provision),
            dependencies: Mutex::new(Vec::new()),
            server: Mutex::new(None),
            outcomes: Mutex::new(Vec::new()),
        }
    }
}

impl CaseScope {
    fn enter(&self, stage: Stage) {
        *lock(&self.stage) = stage;
    }

    fn stage(&self) -> Stage {
        *lock(&self.stage)
    }

    fn track_dependency(&self, descriptor: ConnectionDescriptor) {
        lock(&self.dependencies).push(descriptor);
    }

    fn track_server(&self, server: Arc<MockUpstreamServer>) {
        *lock(&self.server) = Some(server);
    }

    fn take_dependencies(&self) -> Vec<ConnectionDescriptor> {
        std::mem::take(&mut *lock(&self.dependencies))
    }

    fn take_server(&self) -> Option<Arc<MockUpstreamServer>> {
        lock(&self.server).take()
    }

    fn take_outcomes(&self) -> Vec<AssertionOutcome> {
        std::mem::take(&mut *lock(&self.outcomes))
    }

    /// Keep the outcome; a failed one ends the case as an assertion failure
    fn record(&self, outcome: AssertionOutcome) -> Result<()> {
        self.record_as(outcome, HarnessError::Assertion)
    }

    fn record_as(&self, outcome: AssertionOutcome, error: fn(String) -> HarnessError) -> Result<()> {
        let failure = (!outcome.passed)
            .then(|| format!("{}: {}", outcome.description, outcome.explanation));
        lock(&self.outcomes).push(outcome);
        match failure {
            Some(message) => Err(error(message)),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

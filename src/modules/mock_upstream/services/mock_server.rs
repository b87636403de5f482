use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpServer};
use tokio::task::JoinHandle;
use tracing_actix_web::TracingLogger;

use super::journal::RecordedRequests;
use super::state::MockState;
use crate::config::MockServerConfig;
use crate::core::{HarnessError, Result};
use crate::modules::mock_upstream::controllers::stub_handler;
use crate::modules::mock_upstream::models::{
    CannedResponse, RecordedInteraction, RequestMatcher, StubRule, Times,
};

/// A running mock upstream bound to a local port.
///
/// The value is the handle: rules and recordings live here and are
/// dropped with it. Call [`stop`](Self::stop) to shut the listener down.
pub struct MockUpstreamServer {
    state: Arc<MockState>,
    address: SocketAddr,
    server: ServerHandle,
    task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl MockUpstreamServer {
    /// Start on `127.0.0.1:port`; port 0 picks a free port
    pub async fn start(port: u16) -> Result<Self> {
        Self::start_with(&MockServerConfig::new("127.0.0.1".to_string(), port)).await
    }

    pub async fn start_with(config: &MockServerConfig) -> Result<Self> {
        let unmatched_status = StatusCode::from_u16(config.unmatched_status).map_err(|e| {
            HarnessError::Configuration(format!(
                "Invalid unmatched status {}: {}",
                config.unmatched_status, e
            ))
        })?;

        let listener = TcpListener::bind((config.host.as_str(), config.port)).map_err(|e| {
            HarnessError::Provisioning(format!(
                "Mock upstream failed to bind {}: {}",
                config.bind_address(),
                e
            ))
        })?;
        let address = listener.local_addr()?;

        let state = Arc::new(MockState::new(unmatched_status).with_max_body_bytes(config.max_body_bytes));
        let data = web::Data::from(state.clone());

        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .wrap(TracingLogger::default())
                .default_service(web::to(stub_handler::handle))
        })
        .workers(config.workers)
        .disable_signals()
        .listen(listener)?
        .run();

        let handle = server.handle();
        let task = tokio::spawn(server);

        tracing::info!(address = %address, "Mock upstream started");

        Ok(Self {
            state,
            address,
            server: handle,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Base URL to hand to the subject in place of the real third party
    pub fn uri(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Add a stub after all existing ones; returns its registration index
    pub fn register_stub(&self, matcher: RequestMatcher, response: CannedResponse) -> usize {
        let index = self.state.register(matcher, response);
        tracing::debug!(address = %self.address, rule = index, "Stub registered");
        index
    }

    pub fn stubs(&self) -> Vec<StubRule> {
        self.state.rules()
    }

    /// Recorded requests matching `matcher`, read lazily at iteration time
    pub fn recorded_requests(&self, matcher: RequestMatcher) -> RecordedRequests {
        RecordedRequests::new(self.state.journal().clone(), matcher)
    }

    pub fn all_requests(&self) -> RecordedRequests {
        self.recorded_requests(RequestMatcher::any())
    }

    pub fn unmatched_requests(&self) -> Vec<Arc<RecordedInteraction>> {
        self.state
            .journal()
            .snapshot()
            .into_iter()
            .filter(|interaction| !interaction.is_matched())
            .collect()
    }

    /// Check how many recorded requests match `matcher`
    ///
    /// # Errors
    /// `Assertion` when the count does not satisfy `times`
    pub fn verify(&self, matcher: RequestMatcher, times: Times) -> Result<()> {
        let actual = self.recorded_requests(matcher.clone()).count();
        if times.check(actual) {
            return Ok(());
        }
        Err(HarnessError::Assertion(format!(
            "expected {} request(s) matching {}, got {}",
            times, matcher, actual
        )))
    }

    /// # Errors
    /// `StubMismatch` listing every request that no stub answered
    pub fn verify_no_unmatched(&self) -> Result<()> {
        let unmatched = self.unmatched_requests();
        if unmatched.is_empty() {
            return Ok(());
        }
        let requests: Vec<String> = unmatched
            .iter()
            .map(|interaction| interaction.request.to_string())
            .collect();
        Err(HarnessError::StubMismatch(format!(
            "{} request(s) had no matching stub: {}",
            requests.len(),
            requests.join(", ")
        )))
    }

    /// Clear every stub and recording
    pub fn reset(&self) {
        self.state.reset();
        tracing::debug!(address = %self.address, "Mock upstream reset");
    }

    /// Stop accepting requests, let in-flight responses finish and wait for
    /// the server task. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        self.shutdown(true).await
    }

    /// Like [`stop`](Self::stop) but drops in-flight requests, delayed stubs included
    pub async fn abort(&self) -> Result<()> {
        self.shutdown(false).await
    }

    async fn shutdown(&self, graceful: bool) -> Result<()> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(task) = task else {
            return Ok(());
        };

        self.server.stop(graceful).await;
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(HarnessError::Io(e)),
            Err(e) => {
                return Err(HarnessError::Internal(format!(
                    "Mock upstream task failed: {}",
                    e
                )))
            }
        }

        tracing::info!(address = %self.address, graceful, "Mock upstream stopped");
        Ok(())
    }
}

impl Drop for MockUpstreamServer {
    fn drop(&mut self) {
        let running = self
            .task
            .get_mut()
            .map(|task| task.is_some())
            .unwrap_or(false);
        if running {
            // The stop command is sent eagerly; nothing left to await here
            let _ = self.server.stop(false);
        }
    }
}

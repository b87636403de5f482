use async_trait::async_trait;
use reqwest::Client;

use super::app::PaymentApp;
use crate::core::Result;
use crate::modules::orchestrator::models::{SubjectRequest, SubjectResponse};
use crate::modules::orchestrator::services::{send_request, CaseEnvironment, Subject};

/// Runs a fresh payments app per invocation, wired to the case environment
pub struct PaymentApiSubject {
    client: Client,
}

impl PaymentApiSubject {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for PaymentApiSubject {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subject for PaymentApiSubject {
    fn name(&self) -> &str {
        "payments-api"
    }

    async fn invoke(
        &self,
        env: &CaseEnvironment,
        request: &SubjectRequest,
    ) -> Result<SubjectResponse> {
        let app = PaymentApp::start(&env.database.url, &env.upstream_uri).await?;
        let response = send_request(&self.client, &app.base_url(), request).await;

        if let Err(e) = app.stop().await {
            tracing::warn!(case = %env.case_name, error = %e, "Payments app did not stop cleanly");
        }
        response
    }
}

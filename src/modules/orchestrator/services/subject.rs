use std::future::Future;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::core::{HarnessError, Result};
use crate::modules::orchestrator::models::{SubjectRequest, SubjectResponse};
use crate::modules::provisioner::models::ConnectionDescriptor;

/// Everything a subject needs to run against ephemeral dependencies.
///
/// Built fresh for every case and passed explicitly; nothing is read from
/// process-wide state.
#[derive(Debug, Clone)]
pub struct CaseEnvironment {
    pub case_name: String,
    pub database: ConnectionDescriptor,
    /// Base URL that replaces the real third party
    pub upstream_uri: String,
}

/// The black box under test
#[async_trait]
pub trait Subject: Send + Sync {
    fn name(&self) -> &str;

    /// Send one request to the subject and capture its answer
    async fn invoke(&self, env: &CaseEnvironment, request: &SubjectRequest)
        -> Result<SubjectResponse>;
}

/// Subject already listening at a fixed base URL
pub struct HttpSubject {
    name: String,
    base_url: String,
    client: Client,
}

impl HttpSubject {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Subject for HttpSubject {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _env: &CaseEnvironment,
        request: &SubjectRequest,
    ) -> Result<SubjectResponse> {
        send_request(&self.client, &self.base_url, request).await
    }
}

/// Issue `request` against `base_url` over HTTP
pub async fn send_request(
    client: &Client,
    base_url: &str,
    request: &SubjectRequest,
) -> Result<SubjectResponse> {
    let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
        HarnessError::Subject(format!("Invalid method '{}': {}", request.method, e))
    })?;
    let url = format!("{}{}", base_url.trim_end_matches('/'), request.path);

    let mut builder = client.request(method, &url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| HarnessError::Subject(format!("Request to {} failed: {}", url, e)))?;

    let status = response.status().as_u16();
    let raw_body = response.text().await?;
    Ok(SubjectResponse::new(status, raw_body))
}

/// Subject backed by an async closure, for in-process subjects
pub struct FnSubject<F> {
    name: String,
    f: F,
}

impl<F> FnSubject<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Subject for FnSubject<F>
where
    F: Fn(CaseEnvironment, SubjectRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<SubjectResponse>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        env: &CaseEnvironment,
        request: &SubjectRequest,
    ) -> Result<SubjectResponse> {
        (self.f)(env.clone(), request.clone()).await
    }
}

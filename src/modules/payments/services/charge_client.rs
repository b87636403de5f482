use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::Currency;
use crate::modules::payments::error::PaymentError;

/// Body of the processor's `POST /v1/charges`
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Processor answer to a charge
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeResponse {
    pub id: String,
    pub status: String,
}

impl ChargeResponse {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Client for the card processor's charges API
pub struct ChargeClient {
    client: Client,
    base_url: String,
}

impl ChargeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, PaymentError> {
        let url = format!("{}/v1/charges", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(format!("Charge request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Upstream(format!(
                "Processor error {}: {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Upstream(format!("Failed to parse charge response: {}", e)))
    }
}

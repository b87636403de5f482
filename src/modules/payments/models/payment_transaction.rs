use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Currency;
use crate::modules::payments::error::PaymentError;

/// Payment transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Charge accepted by the processor
    Succeeded,
    /// Charge declined by the processor
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Succeeded => write!(f, "succeeded"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(TransactionStatus::Succeeded),
            "failed" => Ok(TransactionStatus::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Body of `POST /payments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    /// Amount in minor units (cents for USD)
    pub amount: i64,
    /// ISO 4217 code, validated against [`Currency`]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreatePaymentRequest {
    /// Parse the currency and check the amount
    pub fn validate(&self) -> Result<Currency, PaymentError> {
        let currency: Currency = self.currency.parse().map_err(PaymentError::Validation)?;
        currency
            .validate_minor_amount(self.amount)
            .map_err(PaymentError::Validation)?;
        Ok(currency)
    }
}

/// Persisted payment transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub amount: i64,
    pub currency: Currency,
    /// Processor-side charge reference
    pub charge_id: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn new(amount: i64, currency: Currency, charge_id: String, status: TransactionStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            amount,
            currency,
            charge_id,
            status,
            created_at: Utc::now(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == TransactionStatus::Succeeded
    }
}

use crate::modules::payments::error::PaymentError;
use crate::modules::payments::models::{CreatePaymentRequest, PaymentTransaction, TransactionStatus};
use crate::modules::payments::repositories::TransactionRepository;

use super::charge_client::{ChargeClient, ChargeRequest};

/// Charges through the processor and records the outcome
///
/// A processor answer (accepted or declined) is always persisted. A
/// processor failure persists nothing.
pub struct PaymentService {
    repository: TransactionRepository,
    charges: ChargeClient,
}

impl PaymentService {
    pub fn new(repository: TransactionRepository, charges: ChargeClient) -> Self {
        Self {
            repository,
            charges,
        }
    }

    pub fn repository(&self) -> &TransactionRepository {
        &self.repository
    }

    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<PaymentTransaction, PaymentError> {
        let currency = request.validate()?;

        let charge = self
            .charges
            .create_charge(&ChargeRequest {
                amount: request.amount,
                currency,
                description: request.description,
            })
            .await?;

        let status = if charge.succeeded() {
            TransactionStatus::Succeeded
        } else {
            TransactionStatus::Failed
        };
        let transaction = PaymentTransaction::new(request.amount, currency, charge.id, status);
        self.repository.create(&transaction).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            charge_id = %transaction.charge_id,
            status = %transaction.status,
            amount = %currency.format_minor(transaction.amount),
            "Payment recorded"
        );

        Ok(transaction)
    }

    pub async fn get_payment(&self, id: &str) -> Result<PaymentTransaction, PaymentError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {}", id)))
    }
}

pub mod charge_client;
pub mod payment_service;

pub use charge_client::{ChargeClient, ChargeRequest, ChargeResponse};
pub use payment_service::PaymentService;

use actix_web::{web, HttpResponse};

use crate::modules::payments::error::PaymentError;
use crate::modules::payments::models::CreatePaymentRequest;
use crate::modules::payments::services::PaymentService;

/// Charge a card
/// POST /payments
///
/// 201 with the transaction when the charge succeeded, 402 when declined.
pub async fn create_payment(
    service: web::Data<PaymentService>,
    request: web::Json<CreatePaymentRequest>,
) -> Result<HttpResponse, PaymentError> {
    let transaction = service.create_payment(request.into_inner()).await?;

    if transaction.is_succeeded() {
        Ok(HttpResponse::Created().json(transaction))
    } else {
        Ok(HttpResponse::PaymentRequired().json(transaction))
    }
}

/// GET /payments/{id}
pub async fn get_payment(
    service: web::Data<PaymentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, PaymentError> {
    let transaction = service.get_payment(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("", web::post().to(create_payment))
            .route("/{id}", web::get().to(get_payment)),
    );
}

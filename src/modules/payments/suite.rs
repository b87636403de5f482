//! Cases exercising the payments API through the harness

use actix_web::http::StatusCode;
use serde_json::json;

use super::repositories::SCHEMA;
use crate::modules::mock_upstream::{CannedResponse, RequestMatcher, Times};
use crate::modules::orchestrator::{SubjectRequest, TestCase};
use crate::modules::provisioner::DependencySpec;

pub const SUITE_NAME: &str = "payments";

/// Database setup every payments case needs
pub fn payment_dependency() -> DependencySpec {
    DependencySpec::new().with_bootstrap([SCHEMA])
}

pub fn charge_succeeds() -> TestCase {
    TestCase::new(
        "charge succeeds",
        SubjectRequest::post_json("/payments", json!({"amount": 1000, "currency": "USD"})),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_123", "status": "succeeded"})),
    )
    .expect_status(201)
    .expect_json("/charge_id", json!("ch_123"))
    .expect_json("/status", json!("succeeded"))
    .expect_rows("payment_transactions", 1)
    .expect_interaction(
        RequestMatcher::post("/v1/charges").with_json_body(json!({"amount": 1000, "currency": "USD"})),
        Times::once(),
    )
}

pub fn charge_declined() -> TestCase {
    TestCase::new(
        "charge declined",
        SubjectRequest::post_json("/payments", json!({"amount": 2500, "currency": "MYR"})),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_456", "status": "declined"})),
    )
    .expect_status(402)
    .expect_json("/status", json!("failed"))
    .expect_scalar(
        "declined charge persisted as failed",
        "SELECT COUNT(*) FROM payment_transactions WHERE charge_id = 'ch_456' AND status = 'failed'",
        1,
    )
    .expect_interaction(RequestMatcher::post("/v1/charges"), Times::once())
}

pub fn processor_outage() -> TestCase {
    TestCase::new(
        "processor outage",
        SubjectRequest::post_json("/payments", json!({"amount": 50000, "currency": "IDR"})),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "unavailable"})),
    )
    .expect_status(502)
    .expect_scalar(
        "nothing persisted for the failed charge",
        "SELECT COUNT(*) FROM payment_transactions WHERE amount = 50000",
        0,
    )
    .expect_interaction(RequestMatcher::post("/v1/charges"), Times::once())
}

pub fn invalid_currency() -> TestCase {
    TestCase::new(
        "invalid currency",
        SubjectRequest::post_json("/payments", json!({"amount": 1000, "currency": "XYZ"})),
    )
    .expect_status(400)
    .expect_scalar(
        "nothing persisted for the rejected request",
        "SELECT COUNT(*) FROM payment_transactions WHERE currency = 'XYZ'",
        0,
    )
    .expect_interaction(RequestMatcher::any(), Times::never())
}

pub fn payment_suite() -> Vec<TestCase> {
    vec![
        charge_succeeds(),
        charge_declined(),
        processor_outage(),
        invalid_currency(),
    ]
}

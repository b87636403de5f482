// Contract tests for the payments API
//
// The app runs in-process via actix-test; the charge processor is a mock
// upstream, so every response shape below comes from real HTTP round trips.

use actix_web::{web, App};
use paytrust_harness::config::connect_any;
use paytrust_harness::mock_upstream::{CannedResponse, MockUpstreamServer, RequestMatcher, Times};
use paytrust_harness::payments::controllers;
use paytrust_harness::payments::repositories::TransactionRepository;
use paytrust_harness::payments::services::{ChargeClient, PaymentService};
use serde_json::{json, Value};

struct Harness {
    _dir: tempfile::TempDir,
    processor: MockUpstreamServer,
    server: actix_test::TestServer,
    service: web::Data<PaymentService>,
}

async fn spawn_payments() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("payments.sqlite").display());
    let repository = TransactionRepository::new(connect_any(&url).await.unwrap());
    repository.migrate().await.unwrap();

    let processor = MockUpstreamServer::start(0).await.unwrap();
    let service = web::Data::new(PaymentService::new(
        repository,
        ChargeClient::new(processor.uri()),
    ));

    let data = service.clone();
    let server = actix_test::start(move || {
        App::new()
            .app_data(data.clone())
            .configure(controllers::configure)
    });

    Harness {
        _dir: dir,
        processor,
        server,
        service,
    }
}

#[actix_web::test]
async fn test_create_payment_response_schema() {
    let harness = spawn_payments().await;
    harness.processor.register_stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_123", "status": "succeeded"})),
    );

    let mut response = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": 1000, "currency": "USD"}))
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.unwrap();
    assert!(body["id"].is_string(), "id must be string");
    assert_eq!(body["amount"], 1000);
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["charge_id"], "ch_123");
    assert_eq!(body["status"], "succeeded");
    assert!(body["created_at"].is_string(), "created_at must be string");

    // The processor saw exactly the charge the API was asked for
    harness
        .processor
        .verify(
            RequestMatcher::post("/v1/charges").with_json_body(json!({"amount": 1000, "currency": "USD"})),
            Times::once(),
        )
        .unwrap();
    assert_eq!(harness.service.repository().count().await.unwrap(), 1);
}

#[actix_web::test]
async fn test_get_payment_round_trip() {
    let harness = spawn_payments().await;
    harness.processor.register_stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_7", "status": "succeeded"})),
    );

    let mut created = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": 250000, "currency": "IDR", "description": "subscription"}))
        .await
        .unwrap();
    let created: Value = created.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let mut fetched = harness
        .server
        .get(format!("/payments/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 200);
    let fetched: Value = fetched.json().await.unwrap();
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["charge_id"], "ch_7");
}

#[actix_web::test]
async fn test_declined_charge_returns_402() {
    let harness = spawn_payments().await;
    harness.processor.register_stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_456", "status": "declined"})),
    );

    let mut response = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": 2500, "currency": "MYR"}))
        .await
        .unwrap();
    assert_eq!(response.status(), 402);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "failed");
    assert_eq!(harness.service.repository().count().await.unwrap(), 1);
}

#[actix_web::test]
async fn test_processor_error_returns_502_and_persists_nothing() {
    let harness = spawn_payments().await;
    harness.processor.register_stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::json(
            actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "unavailable"}),
        ),
    );

    let mut response = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": 1000, "currency": "USD"}))
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 502);
    assert!(body["error"]["message"].as_str().unwrap().contains("503"));
    assert_eq!(harness.service.repository().count().await.unwrap(), 0);
}

#[actix_web::test]
async fn test_validation_errors() {
    let harness = spawn_payments().await;

    let mut bad_currency = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": 1000, "currency": "XYZ"}))
        .await
        .unwrap();
    assert_eq!(bad_currency.status(), 400);
    let body: Value = bad_currency.json().await.unwrap();
    assert_eq!(body["error"]["code"], 400);

    let negative = harness
        .server
        .post("/payments")
        .send_json(&json!({"amount": -5, "currency": "USD"}))
        .await
        .unwrap();
    assert_eq!(negative.status(), 400);

    // Rejected before reaching the processor
    assert!(harness.processor.all_requests().is_empty());
}

#[actix_web::test]
async fn test_unknown_payment_returns_404() {
    let harness = spawn_payments().await;

    let response = harness
        .server
        .get("/payments/does-not-exist")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[actix_web::test]
async fn test_malformed_json_is_rejected_without_processor_call() {
    let harness = spawn_payments().await;

    let client = awc::Client::default();
    let response = client
        .post(harness.server.url("/payments"))
        .insert_header(("content-type", "application/json"))
        .send_body("{\"amount\": ")
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    harness
        .processor
        .verify(RequestMatcher::any(), Times::never())
        .unwrap();
    assert_eq!(harness.service.repository().count().await.unwrap(), 0);
}

// End-to-end: the payments API under the harness
//
// A disposable SQLite database and a scripted charge processor stand in for
// the real infrastructure. The payments app is started fresh for each case.

use std::sync::Arc;

use paytrust_harness::config::{OrchestratorConfig, ProvisionerConfig};
use paytrust_harness::mock_upstream::{CannedResponse, RequestMatcher, Times};
use paytrust_harness::orchestrator::{CaseStatus, SubjectRequest, TestCase, TestOrchestrator};
use paytrust_harness::payments::suite::{charge_succeeds, SUITE_NAME};
use paytrust_harness::payments::{payment_dependency, payment_suite, PaymentApiSubject};
use paytrust_harness::provisioner::services::SqliteBackend;
use paytrust_harness::provisioner::DependencyProvisioner;
use serde_json::json;

fn payments_orchestrator(config: OrchestratorConfig) -> (Arc<DependencyProvisioner>, TestOrchestrator) {
    let provisioner = Arc::new(DependencyProvisioner::new(
        Arc::new(SqliteBackend::new().unwrap()),
        ProvisionerConfig::default(),
    ));
    let orchestrator = TestOrchestrator::new(
        provisioner.clone(),
        Arc::new(PaymentApiSubject::new()),
        config,
    )
    .unwrap()
    .with_dependency(payment_dependency());
    (provisioner, orchestrator)
}

#[actix_web::test]
async fn test_successful_charge_scenario() {
    let (provisioner, orchestrator) = payments_orchestrator(OrchestratorConfig::default());

    let report = orchestrator.run_case(&charge_succeeds()).await;

    assert_eq!(report.status, CaseStatus::Passed, "{:?}", report.failure);
    let descriptions: Vec<&str> = report.outcomes.iter().map(|o| o.description.as_str()).collect();
    assert!(descriptions.contains(&"status is 201"));
    assert!(descriptions.contains(&"payment_transactions row count"));
    assert_eq!(provisioner.live_count(), 0);
}

#[actix_web::test]
async fn test_payment_suite_passes() {
    let (provisioner, orchestrator) = payments_orchestrator(OrchestratorConfig::default());

    let report = orchestrator.run_suite(SUITE_NAME, &payment_suite()).await;

    assert!(report.all_passed(), "{}", report.render_text());
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(provisioner.live_count(), 0);
}

#[actix_web::test]
async fn test_payment_suite_in_parallel() {
    let config = OrchestratorConfig {
        concurrency: 4,
        ..OrchestratorConfig::default()
    };
    let (_, orchestrator) = payments_orchestrator(config);

    let report = orchestrator.run_suite(SUITE_NAME, &payment_suite()).await;
    assert!(report.all_passed(), "{}", report.render_text());
}

#[actix_web::test]
async fn test_wrong_expectation_fails_with_explanation() {
    let (_, orchestrator) = payments_orchestrator(OrchestratorConfig::default());

    // The processor declines, but the case expects a success
    let case = TestCase::new(
        "expects success on decline",
        SubjectRequest::post_json("/payments", json!({"amount": 1000, "currency": "USD"})),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(json!({"id": "ch_9", "status": "declined"})),
    )
    .expect_status(201)
    .expect_interaction(RequestMatcher::post("/v1/charges"), Times::once());

    let report = orchestrator.run_case(&case).await;

    assert_eq!(report.status, CaseStatus::Failed);
    let failed: Vec<_> = report.failed_outcomes().collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].explanation.contains("expected status 201, got 402"));
}

#[actix_web::test]
async fn test_unstubbed_processor_call_is_reported() {
    let (_, orchestrator) = payments_orchestrator(OrchestratorConfig::default());

    let case = TestCase::new(
        "processor not stubbed",
        SubjectRequest::post_json("/payments", json!({"amount": 1000, "currency": "USD"})),
    )
    .expect_status(502);

    let report = orchestrator.run_case(&case).await;

    assert_eq!(report.status, CaseStatus::Failed);
    let failure = report.failure.unwrap();
    assert_eq!(failure.kind, "stub_mismatch");
    assert!(failure.message.contains("POST /v1/charges"));
}

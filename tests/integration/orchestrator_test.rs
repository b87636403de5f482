// Orchestrator protocol: provision, stub, invoke, assert, tear down
//
// Subjects here are plain async functions. They call the mock upstream and
// write to the case database exactly like a real service would.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use helpers::{orchestrator, CountingBackend, TestDataFactory};
use paytrust_harness::config::{connect_any, IsolationPolicy, OrchestratorConfig};
use paytrust_harness::mock_upstream::{CannedResponse, RequestMatcher, Times};
use paytrust_harness::orchestrator::{
    CaseEnvironment, CaseStatus, FnSubject, Stage, Subject, SubjectRequest, SubjectResponse,
    TestCase, TestOrchestrator,
};
use paytrust_harness::provisioner::DependencySpec;
use paytrust_harness::Result;
use serde_json::{json, Value};

const SCHEMA: &str = "CREATE TABLE charges (charge_id VARCHAR(64) NOT NULL)";

/// Charge through the upstream, then record the charge id
async fn charge_and_record(env: CaseEnvironment, request: SubjectRequest) -> Result<SubjectResponse> {
    let upstream = reqwest::Client::new()
        .post(format!("{}/v1/charges", env.upstream_uri))
        .json(&request.body.unwrap_or(Value::Null))
        .send()
        .await?;
    if upstream.status() != 200 {
        return Ok(SubjectResponse::json(502, json!({"error": "upstream"})));
    }

    let charge: Value = upstream.json().await?;
    let charge_id = charge["id"].as_str().unwrap_or_default().to_string();

    let pool = connect_any(&env.database.url).await?;
    sqlx::query("INSERT INTO charges (charge_id) VALUES (?)")
        .bind(charge_id.clone())
        .execute(&pool)
        .await?;
    pool.close().await;

    Ok(SubjectResponse::json(201, json!({"charge_id": charge_id})))
}

static LAST_UPSTREAM: Mutex<Option<String>> = Mutex::new(None);

async fn never_answers(env: CaseEnvironment, _request: SubjectRequest) -> Result<SubjectResponse> {
    *LAST_UPSTREAM.lock().unwrap() = Some(env.upstream_uri.clone());
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(SubjectResponse::json(200, json!({})))
}

async fn panics(_env: CaseEnvironment, _request: SubjectRequest) -> Result<SubjectResponse> {
    panic!("card reader on fire")
}

fn charging_subject() -> Arc<dyn Subject> {
    Arc::new(FnSubject::new("charging", charge_and_record))
}

fn with_schema(orchestrator: TestOrchestrator) -> TestOrchestrator {
    orchestrator.with_dependency(DependencySpec::new().with_bootstrap([SCHEMA]))
}

fn charge_case(name: &str, charge_id: &str) -> TestCase {
    charge_case_with_rows(name, charge_id, 1)
}

fn charge_case_with_rows(name: &str, charge_id: &str, rows: i64) -> TestCase {
    TestCase::new(
        name,
        SubjectRequest::post_json("/payments", TestDataFactory::usd_payment()),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(TestDataFactory::charge_succeeded(charge_id)),
    )
    .expect_status(201)
    .expect_json("/charge_id", json!(charge_id))
    .expect_rows("charges", rows)
    .expect_interaction(RequestMatcher::post("/v1/charges"), Times::once())
}

#[actix_web::test]
async fn test_passing_case() {
    let backend = CountingBackend::new();
    let orchestrator = with_schema(orchestrator(
        backend.clone(),
        charging_subject(),
        OrchestratorConfig::default(),
    ));

    let report = orchestrator.run_case(&charge_case("charge", "ch_123")).await;

    assert_eq!(report.status, CaseStatus::Passed, "{:?}", report.failure);
    assert_eq!(report.outcomes.len(), 5);
    assert!(report.outcomes.iter().all(|o| o.passed));
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_fail_fast_within_case() {
    let backend = CountingBackend::new();
    let orchestrator = with_schema(orchestrator(
        backend.clone(),
        charging_subject(),
        OrchestratorConfig::default(),
    ));

    let case = charge_case("wrong status", "ch_1").expect_status(200);
    let report = orchestrator.run_case(&case).await;

    assert_eq!(report.status, CaseStatus::Failed);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Response);
    assert_eq!(failure.kind, "assertion");
    // Only the failing status check ran
    assert_eq!(report.outcomes.len(), 1);
    assert!(!report.outcomes[0].passed);
    assert!(report.outcomes[0].explanation.contains("got 201"));
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_fail_slow_across_suite() {
    let backend = CountingBackend::new();
    let orchestrator = with_schema(orchestrator(
        backend.clone(),
        charging_subject(),
        OrchestratorConfig::default(),
    ));

    let broken = charge_case("too many rows", "ch_1").expect_rows("charges", 2);
    let cases = vec![broken, charge_case("charge", "ch_2")];
    let report = orchestrator.run_suite("charges", &cases).await;

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.passed, 1);
    let broken = report.case("too many rows").unwrap();
    assert_eq!(broken.failure.as_ref().unwrap().stage, Stage::PersistedState);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(backend.starts(), 2);
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_per_case_isolation() {
    let alone = with_schema(orchestrator(
        CountingBackend::new(),
        charging_subject(),
        OrchestratorConfig::default(),
    ))
    .run_suite("alone", &[charge_case("b", "ch_b")])
    .await;

    let after_a = with_schema(orchestrator(
        CountingBackend::new(),
        charging_subject(),
        OrchestratorConfig::default(),
    ))
    .run_suite("after a", &[charge_case("a", "ch_a"), charge_case("b", "ch_b")])
    .await;

    let b_alone = alone.case("b").unwrap();
    let b_after_a = after_a.case("b").unwrap();
    assert_eq!(b_alone.status, CaseStatus::Passed);
    assert_eq!(b_after_a.status, b_alone.status);
    assert_eq!(b_after_a.outcomes, b_alone.outcomes);
}

#[actix_web::test]
async fn test_shared_instance_acquires_once() {
    let backend = CountingBackend::new();
    let config = OrchestratorConfig {
        isolation: IsolationPolicy::SharedInstance,
        ..OrchestratorConfig::default()
    };
    let orchestrator = with_schema(orchestrator(backend.clone(), charging_subject(), config));

    // Rows accumulate in the shared database
    let cases = vec![
        charge_case_with_rows("first", "ch_1", 1),
        charge_case_with_rows("second", "ch_2", 2),
    ];
    let report = orchestrator.run_suite("shared", &cases).await;

    assert!(report.all_passed(), "{}", report.render_text());
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.stops(), 1);
}

#[actix_web::test]
async fn test_unmatched_upstream_call_fails_case() {
    let backend = CountingBackend::new();
    let orchestrator = with_schema(orchestrator(
        backend.clone(),
        charging_subject(),
        OrchestratorConfig::default(),
    ));

    let case = TestCase::new(
        "no stub",
        SubjectRequest::post_json("/payments", TestDataFactory::usd_payment()),
    );
    let report = orchestrator.run_case(&case).await;

    assert_eq!(report.status, CaseStatus::Failed);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.kind, "stub_mismatch");
    assert_eq!(failure.stage, Stage::Interactions);
    assert!(failure.message.contains("POST /v1/charges"));

    let allowed = orchestrator.run_case(&case.clone().allow_unmatched()).await;
    assert_eq!(allowed.status, CaseStatus::Passed);
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_case_timeout_still_tears_down() {
    let backend = CountingBackend::new();
    let config = OrchestratorConfig {
        case_timeout: Duration::from_millis(500),
        ..OrchestratorConfig::default()
    };
    let orchestrator = orchestrator(
        backend.clone(),
        Arc::new(FnSubject::new("never answers", never_answers)),
        config,
    );

    let report = orchestrator
        .run_case(&TestCase::new("slow", SubjectRequest::get("/payments/p1")))
        .await;

    assert_eq!(report.status, CaseStatus::Error);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.kind, "timeout");
    assert_eq!(failure.stage, Stage::Invoke);
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.live(), 0);

    let upstream = LAST_UPSTREAM.lock().unwrap().clone().unwrap();
    assert!(reqwest::get(format!("{}/v1/charges", upstream)).await.is_err());
}

#[actix_web::test]
async fn test_timeout_during_delayed_stub_tears_down_cleanly() {
    let backend = CountingBackend::new();
    let config = OrchestratorConfig {
        case_timeout: Duration::from_millis(300),
        ..OrchestratorConfig::default()
    };
    let orchestrator = with_schema(orchestrator(backend.clone(), charging_subject(), config));

    let case = TestCase::new(
        "processor hangs",
        SubjectRequest::post_json("/payments", TestDataFactory::usd_payment()),
    )
    .stub(
        RequestMatcher::post("/v1/charges"),
        CannedResponse::ok_json(TestDataFactory::charge_succeeded("ch_slow"))
            .with_delay(Duration::from_secs(5)),
    );
    let report = orchestrator.run_case(&case).await;

    assert_eq!(report.status, CaseStatus::Error);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.kind, "timeout");
    assert_eq!(failure.stage, Stage::Invoke);
    assert!(report.teardown_errors.is_empty(), "{:?}", report.teardown_errors);
    assert!(report.duration_ms < 5_000);
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_timeout_during_provisioning_releases_late_dependency() {
    let backend = CountingBackend::slow_ready(Duration::from_secs(1));
    let config = OrchestratorConfig {
        case_timeout: Duration::from_millis(200),
        ..OrchestratorConfig::default()
    };
    let orchestrator = with_schema(orchestrator(backend.clone(), charging_subject(), config));

    let report = orchestrator
        .run_suite("slow database", &[charge_case("charge", "ch_1")])
        .await;

    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Error);
    let failure = case.failure.as_ref().unwrap();
    assert_eq!(failure.kind, "timeout");
    assert_eq!(failure.stage, Stage::Provision);
    assert!(report.teardown_errors.is_empty(), "{:?}", report.teardown_errors);
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_subject_panic_is_reported() {
    let backend = CountingBackend::new();
    let orchestrator = orchestrator(
        backend.clone(),
        Arc::new(FnSubject::new("panics", panics)),
        OrchestratorConfig::default(),
    );

    let report = orchestrator
        .run_case(&TestCase::new("crash", SubjectRequest::get("/payments/p1")))
        .await;

    assert_eq!(report.status, CaseStatus::Error);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.kind, "subject");
    assert!(failure.message.contains("card reader on fire"));
    assert_eq!(backend.live(), 0);
}

#[actix_web::test]
async fn test_provisioning_failure_is_an_error() {
    let backend = CountingBackend::failing(1);
    let orchestrator = orchestrator(backend.clone(), charging_subject(), OrchestratorConfig::default());

    let report = orchestrator.run_case(&charge_case("no database", "ch_1")).await;

    assert_eq!(report.status, CaseStatus::Error);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Provision);
    assert_eq!(failure.kind, "provisioning");
    assert!(report.outcomes.is_empty());
}

#[actix_web::test]
async fn test_parallel_cases() {
    let backend = CountingBackend::new();
    let config = OrchestratorConfig {
        concurrency: 4,
        ..OrchestratorConfig::default()
    };
    let orchestrator = with_schema(orchestrator(backend.clone(), charging_subject(), config));

    let cases: Vec<TestCase> = (0..6)
        .map(|i| charge_case(&format!("charge {}", i), &format!("ch_{}", i)))
        .collect();
    let report = orchestrator.run_suite("parallel", &cases).await;

    assert!(report.all_passed(), "{}", report.render_text());
    let names: Vec<&str> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names[0], "charge 0");
    assert_eq!(names[5], "charge 5");
    assert_eq!(backend.starts(), 6);
    assert_eq!(backend.live(), 0);
}

#[test]
fn test_parallel_shared_instance_rejected() {
    let config = OrchestratorConfig {
        isolation: IsolationPolicy::SharedInstance,
        concurrency: 2,
        ..OrchestratorConfig::default()
    };
    let result = TestOrchestrator::new(
        helpers::provisioner(CountingBackend::new()),
        charging_subject(),
        config,
    );
    assert!(result.is_err());
}

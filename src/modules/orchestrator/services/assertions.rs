//! Single-condition checks producing [`AssertionOutcome`]s
//!
//! Each function checks exactly one condition so the orchestrator can stop
//! at the first failure without evaluating the rest.

use serde_json::Value;
use sqlx::AnyPool;

use crate::core::Result;
use crate::modules::mock_upstream::MockUpstreamServer;
use crate::modules::orchestrator::models::{
    AssertionOutcome, InteractionExpectation, Stage, StateExpectation, SubjectResponse,
};

pub fn assert_status(expected: u16, response: &SubjectResponse) -> AssertionOutcome {
    AssertionOutcome::check(
        Stage::Response,
        format!("status is {}", expected),
        response.status == expected,
        format!(
            "expected status {}, got {} (body: {})",
            expected,
            response.status,
            truncate(&response.raw_body, 200)
        ),
    )
}

/// `pointer` is an RFC 6901 JSON pointer into the response body
pub fn assert_json_field(pointer: &str, expected: &Value, response: &SubjectResponse) -> AssertionOutcome {
    let description = format!("body {} == {}", pointer, expected);
    match response.body.pointer(pointer) {
        Some(actual) => AssertionOutcome::check(
            Stage::Response,
            description,
            actual == expected,
            format!("expected {} at {}, got {}", expected, pointer, actual),
        ),
        None => AssertionOutcome::fail(
            Stage::Response,
            description,
            format!("no value at {} in {}", pointer, response.body),
        ),
    }
}

/// Run a scalar query against the case database
///
/// # Errors
/// Database errors are infrastructure failures, not assertion outcomes
pub async fn assert_scalar(pool: &AnyPool, expectation: &StateExpectation) -> Result<AssertionOutcome> {
    let actual: i64 = sqlx::query_scalar(&expectation.query).fetch_one(pool).await?;
    Ok(AssertionOutcome::check(
        Stage::PersistedState,
        expectation.description.clone(),
        actual == expectation.expected,
        format!(
            "expected {} from `{}`, got {}",
            expectation.expected, expectation.query, actual
        ),
    ))
}

pub fn assert_interaction(server: &MockUpstreamServer, expectation: &InteractionExpectation) -> AssertionOutcome {
    let actual = server.recorded_requests(expectation.matcher.clone()).count();
    AssertionOutcome::check(
        Stage::Interactions,
        format!("{} {} time(s)", expectation.matcher, expectation.times),
        expectation.times.check(actual),
        format!(
            "expected {} request(s) matching {}, got {}",
            expectation.times, expectation.matcher, actual
        ),
    )
}

pub fn assert_no_unmatched(server: &MockUpstreamServer) -> AssertionOutcome {
    let unmatched: Vec<String> = server
        .unmatched_requests()
        .iter()
        .map(|interaction| interaction.request.to_string())
        .collect();

    AssertionOutcome::check(
        Stage::Interactions,
        "every upstream call matched a stub",
        unmatched.is_empty(),
        format!(
            "{} request(s) had no matching stub: {}",
            unmatched.len(),
            unmatched.join(", ")
        ),
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

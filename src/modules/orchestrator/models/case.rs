use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modules::mock_upstream::models::{CannedResponse, RequestMatcher, Times};

/// Request handed to the subject under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl SubjectRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    pub fn post_json(path: &str, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new("POST", path)
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// What the subject answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResponse {
    pub status: u16,
    /// Parsed JSON body, `Null` when empty or not JSON
    pub body: Value,
    pub raw_body: String,
}

impl SubjectResponse {
    pub fn new(status: u16, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let body = serde_json::from_str(&raw_body).unwrap_or(Value::Null);
        Self {
            status,
            body,
            raw_body,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            raw_body: body.to_string(),
            body,
        }
    }
}

/// Scripted upstream behaviour registered before the subject runs
#[derive(Debug, Clone)]
pub struct StubDefinition {
    pub matcher: RequestMatcher,
    pub response: CannedResponse,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseExpectation {
    pub status: Option<u16>,
    /// JSON pointer (RFC 6901) and expected value
    pub json_fields: Vec<(String, Value)>,
}

/// Scalar query against the case database with its expected result
#[derive(Debug, Clone)]
pub struct StateExpectation {
    pub description: String,
    pub query: String,
    pub expected: i64,
}

#[derive(Debug, Clone)]
pub struct InteractionExpectation {
    pub matcher: RequestMatcher,
    pub times: Times,
}

/// One test case: stubs, input and everything asserted afterwards
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub stubs: Vec<StubDefinition>,
    pub request: SubjectRequest,
    pub response: ResponseExpectation,
    pub state: Vec<StateExpectation>,
    pub interactions: Vec<InteractionExpectation>,
    /// Tolerate upstream calls that no stub answered
    pub allow_unmatched: bool,
}

impl TestCase {
    pub fn new(name: impl Into<String>, request: SubjectRequest) -> Self {
        Self {
            name: name.into(),
            stubs: Vec::new(),
            request,
            response: ResponseExpectation::default(),
            state: Vec::new(),
            interactions: Vec::new(),
            allow_unmatched: false,
        }
    }

    pub fn stub(mut self, matcher: RequestMatcher, response: CannedResponse) -> Self {
        self.stubs.push(StubDefinition { matcher, response });
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.response.status = Some(status);
        self
    }

    pub fn expect_json(mut self, pointer: &str, value: Value) -> Self {
        self.response.json_fields.push((pointer.to_string(), value));
        self
    }

    pub fn expect_scalar(mut self, description: &str, query: &str, expected: i64) -> Self {
        self.state.push(StateExpectation {
            description: description.to_string(),
            query: query.to_string(),
            expected,
        });
        self
    }

    /// Shorthand for `SELECT COUNT(*) FROM table`
    pub fn expect_rows(self, table: &str, expected: i64) -> Self {
        let description = format!("{} row count", table);
        let query = format!("SELECT COUNT(*) FROM {}", table);
        self.expect_scalar(&description, &query, expected)
    }

    pub fn expect_interaction(mut self, matcher: RequestMatcher, times: Times) -> Self {
        self.interactions.push(InteractionExpectation { matcher, times });
        self
    }

    pub fn allow_unmatched(mut self) -> Self {
        self.allow_unmatched = true;
        self
    }
}

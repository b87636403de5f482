use std::fmt;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use regex::Regex;
use serde_json::Value;

use super::interaction::InboundRequest;
use crate::core::{HarnessError, Result};

/// HTTP method constraint of a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    /// Uppercase method name
    Exact(String),
}

impl MethodMatcher {
    pub fn exact(method: &str) -> Self {
        MethodMatcher::Exact(method.to_uppercase())
    }

    fn matches(&self, method: &str) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Exact(expected) => expected.eq_ignore_ascii_case(method),
        }
    }
}

/// Path constraint of a matcher, query string excluded
#[derive(Debug, Clone)]
pub enum PathPattern {
    Any,
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl PathPattern {
    /// Anchored regular expression over the whole path
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{})$", pattern))
            .map(PathPattern::Regex)
            .map_err(|e| HarnessError::Configuration(format!("Invalid path pattern '{}': {}", pattern, e)))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(expected) => expected == path,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathPattern::Regex(re) => re.is_match(path),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Any => write!(f, "*"),
            PathPattern::Exact(path) => write!(f, "{}", path),
            PathPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            PathPattern::Regex(re) => write!(f, "~{}", re.as_str()),
        }
    }
}

/// Request-matching predicate: method + path pattern, optionally headers and a JSON body subset
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    method: MethodMatcher,
    path: PathPattern,
    headers: Vec<(String, String)>,
    body_json: Option<Value>,
}

impl RequestMatcher {
    pub fn new(method: MethodMatcher, path: PathPattern) -> Self {
        Self {
            method,
            path,
            headers: Vec::new(),
            body_json: None,
        }
    }

    /// Matches every request
    pub fn any() -> Self {
        Self::new(MethodMatcher::Any, PathPattern::Any)
    }

    /// Exact method and exact path
    pub fn request(method: &str, path: &str) -> Self {
        Self::new(MethodMatcher::exact(method), PathPattern::Exact(path.to_string()))
    }

    pub fn get(path: &str) -> Self {
        Self::request("GET", path)
    }

    pub fn post(path: &str) -> Self {
        Self::request("POST", path)
    }

    pub fn put(path: &str) -> Self {
        Self::request("PUT", path)
    }

    pub fn delete(path: &str) -> Self {
        Self::request("DELETE", path)
    }

    /// Any method on paths starting with `prefix`
    pub fn path_prefix(prefix: &str) -> Self {
        Self::new(MethodMatcher::Any, PathPattern::Prefix(prefix.to_string()))
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = MethodMatcher::exact(method);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    /// Require the body to be JSON containing `subset`
    pub fn with_json_body(mut self, subset: Value) -> Self {
        self.body_json = Some(subset);
        self
    }

    pub fn matches(&self, request: &InboundRequest) -> bool {
        if !self.method.matches(&request.method) || !self.path.matches(&request.path) {
            return false;
        }

        let headers_match = self
            .headers
            .iter()
            .all(|(name, value)| request.header(name) == Some(value.as_str()));
        if !headers_match {
            return false;
        }

        match &self.body_json {
            None => true,
            Some(subset) => request
                .json_body()
                .map(|actual| json_contains(&actual, subset))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            MethodMatcher::Any => write!(f, "ANY {}", self.path)?,
            MethodMatcher::Exact(method) => write!(f, "{} {}", method, self.path)?,
        }
        for (name, value) in &self.headers {
            write!(f, " [{}: {}]", name, value)?;
        }
        if let Some(body) = &self.body_json {
            write!(f, " body~{}", body)?;
        }
        Ok(())
    }
}

/// `actual` contains `subset`: objects recursively by key, everything else by equality
pub fn json_contains(actual: &Value, subset: &Value) -> bool {
    match (actual, subset) {
        (Value::Object(actual), Value::Object(subset)) => subset.iter().all(|(key, expected)| {
            actual
                .get(key)
                .map(|value| json_contains(value, expected))
                .unwrap_or(false)
        }),
        _ => actual == subset,
    }
}

/// Body of a canned response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(Value),
}

/// Scripted response returned when a stub matches
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub headers: Vec<(String, String)>,
    /// Wait before answering
    pub delay: Option<Duration>,
}

impl CannedResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: ResponseBody::Empty,
            headers: Vec::new(),
            delay: None,
        }
    }

    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            body: ResponseBody::Json(body),
            ..Self::new(status)
        }
    }

    pub fn ok_json(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Text(body.into()),
            ..Self::new(status)
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn to_http_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in &self.headers {
            builder.insert_header((name.as_str(), value.as_str()));
        }

        match &self.body {
            ResponseBody::Empty => builder.finish(),
            ResponseBody::Text(text) => builder.body(text.clone()),
            ResponseBody::Json(value) => builder.json(value),
        }
    }
}

/// A registered stub: matcher and response, identified by registration order
#[derive(Debug, Clone)]
pub struct StubRule {
    pub index: usize,
    pub matcher: RequestMatcher,
    pub response: CannedResponse,
}

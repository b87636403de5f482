use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request as seen by the mock upstream, before it is journaled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Uppercase HTTP method
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Set when the body exceeded the server's limit and only a prefix was kept
    #[serde(default)]
    pub body_truncated: bool,
}

impl InboundRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            query: None,
            headers: BTreeMap::new(),
            body: Vec::new(),
            body_truncated: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json_body(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl fmt::Display for InboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{} {}?{}", self.method, self.path, query)?,
            None => write!(f, "{} {}", self.method, self.path)?,
        }
        if self.body_truncated {
            write!(f, " (body truncated at {} bytes)", self.body.len())?;
        }
        Ok(())
    }
}

/// An inbound request retained for verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedInteraction {
    /// Position in the journal, strictly increasing per case
    pub sequence: u64,
    pub request: InboundRequest,
    /// Registration index of the stub that answered, `None` when unmatched
    pub matched_rule: Option<usize>,
    pub received_at: DateTime<Utc>,
}

impl RecordedInteraction {
    pub fn is_matched(&self) -> bool {
        self.matched_rule.is_some()
    }
}

/// Expected number of matching interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Times {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl Times {
    pub fn once() -> Self {
        Times::Exactly(1)
    }

    pub fn never() -> Self {
        Times::Exactly(0)
    }

    pub fn check(&self, actual: usize) -> bool {
        match *self {
            Times::Exactly(n) => actual == n,
            Times::AtLeast(n) => actual >= n,
            Times::AtMost(n) => actual <= n,
        }
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Times::Exactly(n) => write!(f, "exactly {}", n),
            Times::AtLeast(n) => write!(f, "at least {}", n),
            Times::AtMost(n) => write!(f, "at most {}", n),
        }
    }
}

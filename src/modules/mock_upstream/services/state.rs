use std::sync::{Arc, RwLock};

use actix_web::http::StatusCode;

use super::journal::Journal;
use crate::config::server::DEFAULT_MAX_BODY_BYTES;
use crate::modules::mock_upstream::models::{
    CannedResponse, InboundRequest, RequestMatcher, StubRule,
};

/// Shared state between a mock server handle and its request handlers
pub struct MockState {
    rules: RwLock<Vec<StubRule>>,
    journal: Arc<Journal>,
    unmatched_status: StatusCode,
    max_body_bytes: usize,
}

impl MockState {
    pub fn new(unmatched_status: StatusCode) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            journal: Arc::new(Journal::new()),
            unmatched_status,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    pub fn unmatched_status(&self) -> StatusCode {
        self.unmatched_status
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Add a rule after all existing ones and return its index
    pub fn register(&self, matcher: RequestMatcher, response: CannedResponse) -> usize {
        let mut rules = self
            .rules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = rules.len();
        rules.push(StubRule {
            index,
            matcher,
            response,
        });
        index
    }

    /// First rule in registration order that matches
    pub fn first_match(&self, request: &InboundRequest) -> Option<(usize, CannedResponse)> {
        let rules = self
            .rules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| (rule.index, rule.response.clone()))
    }

    pub fn rules(&self) -> Vec<StubRule> {
        self.rules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drop every rule and recording
    pub fn reset(&self) {
        self.rules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.journal.clear();
    }
}

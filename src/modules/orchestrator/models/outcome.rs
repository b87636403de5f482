use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::HarnessError;

/// Step of the per-case protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Provision,
    Stub,
    Invoke,
    Response,
    PersistedState,
    Interactions,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Provision => "provision",
            Stage::Stub => "stub",
            Stage::Invoke => "invoke",
            Stage::Response => "response",
            Stage::PersistedState => "persisted_state",
            Stage::Interactions => "interactions",
            Stage::Teardown => "teardown",
        };
        write!(f, "{}", name)
    }
}

/// Result of one checked condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub stage: Stage,
    pub description: String,
    pub passed: bool,
    pub explanation: String,
}

impl AssertionOutcome {
    pub fn pass(stage: Stage, description: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            stage,
            description: description.into(),
            passed: true,
            explanation: explanation.into(),
        }
    }

    pub fn fail(stage: Stage, description: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            stage,
            description: description.into(),
            passed: false,
            explanation: explanation.into(),
        }
    }

    pub fn check(
        stage: Stage,
        description: impl Into<String>,
        passed: bool,
        explanation: impl Into<String>,
    ) -> Self {
        if passed {
            Self::pass(stage, description, explanation)
        } else {
            Self::fail(stage, description, explanation)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    /// An assertion failed or an upstream call had no stub
    Failed,
    /// Infrastructure failure, timeout or subject crash
    Error,
}

/// Why a case did not pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub stage: Stage,
    /// `HarnessError::kind` of the cause
    pub kind: String,
    pub message: String,
}

impl CaseFailure {
    pub fn from_error(stage: Stage, error: &HarnessError) -> Self {
        Self {
            stage,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub status: CaseStatus,
    pub outcomes: Vec<AssertionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseFailure>,
    /// Failures hit while tearing down, reported even when the case passed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown_errors: Vec<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

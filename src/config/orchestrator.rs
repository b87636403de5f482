use super::parse_var;
use crate::core::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How backing dependencies are shared between cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationPolicy {
    /// One dependency for the whole suite
    SharedInstance,
    /// A fresh dependency for every case
    PerCaseInstance,
}

impl fmt::Display for IsolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationPolicy::SharedInstance => write!(f, "shared-instance"),
            IsolationPolicy::PerCaseInstance => write!(f, "per-case-instance"),
        }
    }
}

impl FromStr for IsolationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" | "shared-instance" => Ok(IsolationPolicy::SharedInstance),
            "per-case" | "per-case-instance" => Ok(IsolationPolicy::PerCaseInstance),
            other => Err(format!("unknown isolation policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub isolation: IsolationPolicy,
    /// Number of cases executed at once
    pub concurrency: usize,
    /// Bound on a whole case, from provisioning through assertions
    pub case_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationPolicy::PerCaseInstance,
            concurrency: 1,
            case_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(OrchestratorConfig {
            isolation: parse_var(vars, "HARNESS_ISOLATION", "per-case")?,
            concurrency: parse_var(vars, "HARNESS_CONCURRENCY", "1")?,
            case_timeout: Duration::from_secs(parse_var(vars, "HARNESS_CASE_TIMEOUT_SECS", "30")?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HarnessError::Configuration(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.case_timeout.is_zero() {
            return Err(HarnessError::Configuration(
                "Case timeout must be greater than 0".to_string(),
            ));
        }

        // A black-box subject cannot be handed a transactional view of a shared
        // database, so parallel cases need their own instance.
        if self.concurrency > 1 && self.isolation == IsolationPolicy::SharedInstance {
            return Err(HarnessError::Configuration(format!(
                "Isolation policy {} cannot run with concurrency {}; use per-case-instance",
                self.isolation, self.concurrency
            )));
        }

        Ok(())
    }
}

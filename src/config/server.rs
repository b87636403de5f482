use super::parse_var;
use crate::core::{HarnessError, Result};

/// Bind configuration for mock upstream servers
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    pub host: String,
    /// 0 picks an ephemeral port
    pub port: u16,
    pub workers: usize,
    /// Status returned when no stub matches
    pub unmatched_status: u16,
    /// Larger request bodies are journaled as unmatched and answered with 413
    pub max_body_bytes: usize,
}

/// 16 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: 2,
            unmatched_status: 404,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl MockServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(MockServerConfig {
            host: vars("HARNESS_MOCK_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(vars, "HARNESS_MOCK_PORT", "0")?,
            workers: parse_var(vars, "HARNESS_MOCK_WORKERS", "2")?,
            unmatched_status: parse_var(vars, "HARNESS_MOCK_UNMATCHED_STATUS", "404")?,
            max_body_bytes: parse_var(
                vars,
                "HARNESS_MOCK_MAX_BODY_BYTES",
                &DEFAULT_MAX_BODY_BYTES.to_string(),
            )?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HarnessError::Configuration(
                "Mock server workers must be greater than 0".to_string(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(HarnessError::Configuration(
                "Mock server body limit must be greater than 0".to_string(),
            ));
        }

        if !(400..=599).contains(&self.unmatched_status) {
            return Err(HarnessError::Configuration(format!(
                "Unmatched status must be an error status (4xx/5xx), got {}",
                self.unmatched_status
            )));
        }

        Ok(())
    }
}

use std::time::Duration;

/// Harness-wide Result type
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Main harness error type
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    /// A backing dependency failed to start or stop
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// An outbound call reached the mock upstream without a matching stub
    #[error("Stub mismatch: {0}")]
    StubMismatch(String),

    /// An expected condition was not met
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// An operation exceeded its time bound
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The subject under test could not be invoked
    #[error("Subject error: {0}")]
    Subject(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Socket and filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

// Helper functions for common error scenarios
impl HarnessError {
    pub fn provisioning(msg: impl Into<String>) -> Self {
        HarnessError::Provisioning(msg.into())
    }

    pub fn stub_mismatch(msg: impl Into<String>) -> Self {
        HarnessError::StubMismatch(msg.into())
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        HarnessError::Assertion(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        HarnessError::Timeout {
            operation: operation.into(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        HarnessError::Configuration(msg.into())
    }

    pub fn subject(msg: impl Into<String>) -> Self {
        HarnessError::Subject(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        HarnessError::Internal(msg.into())
    }

    /// Stable, machine-readable label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Provisioning(_) => "provisioning",
            HarnessError::StubMismatch(_) => "stub_mismatch",
            HarnessError::Assertion(_) => "assertion",
            HarnessError::Timeout { .. } => "timeout",
            HarnessError::Configuration(_) => "configuration",
            HarnessError::Subject(_) => "subject",
            HarnessError::Database(_) => "database",
            HarnessError::HttpClient(_) => "http_client",
            HarnessError::Json(_) => "json",
            HarnessError::Io(_) => "io",
            HarnessError::Internal(_) => "internal",
        }
    }

    /// Whether the error is a test failure rather than broken infrastructure.
    ///
    /// Test failures mark a case `failed`; everything else marks it `error`.
    pub fn is_test_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::Assertion(_) | HarnessError::StubMismatch(_)
        )
    }
}

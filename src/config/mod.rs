use crate::core::{HarnessError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub mod database;
pub mod orchestrator;
pub mod server;

pub use database::{connect_any, BackendKind, ProvisionerConfig};
pub use orchestrator::{IsolationPolicy, OrchestratorConfig};
pub use server::MockServerConfig;

/// Main harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub app: AppConfig,
    pub provisioner: ProvisionerConfig,
    pub mock_server: MockServerConfig,
    pub orchestrator: OrchestratorConfig,
    /// Where the JSON suite report is written, if anywhere
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(&|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let config = HarnessConfig {
            app: AppConfig {
                env: vars("APP_ENV").unwrap_or_else(|| "test".to_string()),
                log_level: vars("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                log_format: parse_var(vars, "LOG_FORMAT", "pretty")?,
            },
            provisioner: ProvisionerConfig::from_vars(vars)?,
            mock_server: MockServerConfig::from_vars(vars)?,
            orchestrator: OrchestratorConfig::from_vars(vars)?,
            report_path: vars("HARNESS_REPORT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.provisioner.validate()?;
        self.mock_server.validate()?;
        self.orchestrator.validate()?;
        Ok(())
    }
}

/// Read and parse a variable, falling back to `default` when it is unset
pub(crate) fn parse_var<T>(
    vars: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = vars(name).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| HarnessError::Configuration(format!("Invalid {}: {}", name, e)))
}

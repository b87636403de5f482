use super::parse_var;
use crate::core::{HarnessError, Result};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::str::FromStr;
use std::time::Duration;

/// Which backend provides ephemeral databases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite files in a per-run temp directory
    Sqlite,
    /// Throwaway databases on an existing MySQL server
    MySql,
    /// Disposable MySQL containers (cargo feature `containers`)
    Container,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "mysql" => Ok(BackendKind::MySql),
            "container" | "containers" | "docker" => Ok(BackendKind::Container),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub backend: BackendKind,
    /// Admin URL of the MySQL server used by the `mysql` backend
    pub mysql_url: Option<String>,
    /// Bound on each start attempt (and on schema bootstrap)
    pub timeout: Duration,
    /// Extra start attempts after the first failure, 0 disables retries
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            mysql_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl ProvisionerConfig {
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(ProvisionerConfig {
            backend: parse_var(vars, "HARNESS_BACKEND", "sqlite")?,
            mysql_url: vars("HARNESS_MYSQL_URL").filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_secs(parse_var(vars, "HARNESS_PROVISION_TIMEOUT_SECS", "60")?),
            max_retries: parse_var(vars, "HARNESS_PROVISION_RETRIES", "0")?,
            retry_backoff: Duration::from_millis(parse_var(
                vars,
                "HARNESS_PROVISION_BACKOFF_MS",
                "500",
            )?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(HarnessError::Configuration(
                "Provisioning timeout must be greater than 0".to_string(),
            ));
        }

        if self.backend == BackendKind::MySql && self.mysql_url.is_none() {
            return Err(HarnessError::Configuration(
                "HARNESS_MYSQL_URL must be set for the mysql backend".to_string(),
            ));
        }

        Ok(())
    }
}

/// Open a small pool against any supported database URL
pub async fn connect_any(url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    AnyPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .map_err(HarnessError::Database)
}

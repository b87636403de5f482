use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, ProvisionerConfig};
use crate::core::{HarnessError, Result};
use crate::modules::provisioner::models::{ConnectionDescriptor, DependencyKind};

/// A started resource before the provisioner assigns it an identity
#[derive(Debug, Clone)]
pub struct BackendResource {
    pub url: String,
    pub resource: String,
}

/// Source of ephemeral backing resources
#[async_trait]
pub trait DependencyBackend: Send + Sync {
    /// Backend name for logs and errors
    fn name(&self) -> &str;

    /// Check if this backend can provide a kind of dependency
    fn supports(&self, kind: DependencyKind) -> bool;

    /// Start a fresh resource and return once it accepts connections
    async fn start(&self, kind: DependencyKind) -> Result<BackendResource>;

    /// Destroy a resource previously returned by `start`
    async fn stop(&self, descriptor: &ConnectionDescriptor) -> Result<()>;
}

/// Build the backend selected by configuration
pub fn backend_from_config(config: &ProvisionerConfig) -> Result<Arc<dyn DependencyBackend>> {
    match config.backend {
        BackendKind::Sqlite => Ok(Arc::new(super::sqlite::SqliteBackend::new()?)),
        BackendKind::MySql => {
            let url = config.mysql_url.clone().ok_or_else(|| {
                HarnessError::Configuration("HARNESS_MYSQL_URL not set".to_string())
            })?;
            Ok(Arc::new(super::mysql::MySqlBackend::new(url)))
        }
        #[cfg(feature = "containers")]
        BackendKind::Container => Ok(Arc::new(super::container::ContainerBackend::new())),
        #[cfg(not(feature = "containers"))]
        BackendKind::Container => Err(HarnessError::Configuration(
            "container backend requires building with --features containers".to_string(),
        )),
    }
}

//! Disposable MySQL containers via testcontainers (requires Docker).

use std::collections::HashMap;

use async_trait::async_trait;
use testcontainers_modules::mysql::Mysql;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;
use tokio::sync::Mutex;

use super::backend::{BackendResource, DependencyBackend};
use crate::core::{HarnessError, Result};
use crate::modules::provisioner::models::{ConnectionDescriptor, DependencyKind};

const MYSQL_PORT: u16 = 3306;

pub struct ContainerBackend {
    /// Running containers keyed by container id
    containers: Mutex<HashMap<String, ContainerAsync<Mysql>>>,
}

impl ContainerBackend {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ContainerBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DependencyBackend for ContainerBackend {
    fn name(&self) -> &str {
        "container"
    }

    fn supports(&self, kind: DependencyKind) -> bool {
        matches!(kind, DependencyKind::RelationalStore)
    }

    async fn start(&self, _kind: DependencyKind) -> Result<BackendResource> {
        tracing::info!("Starting MySQL container");
        let container = Mysql::default().start().await.map_err(|e| {
            HarnessError::Provisioning(format!("Failed to start MySQL container: {}", e))
        })?;

        let host = container.get_host().await.map_err(|e| {
            HarnessError::Provisioning(format!("Failed to resolve container host: {}", e))
        })?;
        let port = container
            .get_host_port_ipv4(MYSQL_PORT)
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!("Failed to resolve container port: {}", e))
            })?;

        let id = container.id().to_string();
        let url = format!("mysql://root@{}:{}/test", host, port);
        tracing::info!(container_id = %id, url = %url, "MySQL container ready");

        self.containers.lock().await.insert(id.clone(), container);

        Ok(BackendResource { url, resource: id })
    }

    async fn stop(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        let container = self.containers.lock().await.remove(&descriptor.resource);
        let Some(container) = container else {
            return Ok(());
        };

        container.stop().await.map_err(|e| {
            HarnessError::Provisioning(format!(
                "Failed to stop container {}: {}",
                descriptor.resource, e
            ))
        })?;
        container.rm().await.map_err(|e| {
            HarnessError::Provisioning(format!(
                "Failed to remove container {}: {}",
                descriptor.resource, e
            ))
        })?;
        Ok(())
    }
}

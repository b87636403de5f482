use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use uuid::Uuid;

use super::backend::{BackendResource, DependencyBackend};
use crate::core::{HarnessError, Result};
use crate::modules::provisioner::models::{ConnectionDescriptor, DependencyKind};

/// Throwaway databases on an existing MySQL server.
///
/// Each start creates `harness_<uuid>`; stop drops it.
pub struct MySqlBackend {
    admin_url: String,
}

impl MySqlBackend {
    pub fn new(admin_url: String) -> Self {
        Self { admin_url }
    }

    async fn admin_pool(&self) -> Result<MySqlPool> {
        MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&self.admin_url)
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!(
                    "Failed to connect to MySQL admin URL: {}",
                    e
                ))
            })
    }

    /// Admin URL with its path pointed at `database`
    fn database_url(&self, database: &str) -> Result<String> {
        let mut url = Url::parse(&self.admin_url).map_err(|e| {
            HarnessError::Configuration(format!("Invalid HARNESS_MYSQL_URL: {}", e))
        })?;
        url.set_path(&format!("/{}", database));
        Ok(url.to_string())
    }
}

#[async_trait]
impl DependencyBackend for MySqlBackend {
    fn name(&self) -> &str {
        "mysql"
    }

    fn supports(&self, kind: DependencyKind) -> bool {
        matches!(kind, DependencyKind::RelationalStore)
    }

    async fn start(&self, _kind: DependencyKind) -> Result<BackendResource> {
        let database = format!("harness_{}", Uuid::new_v4().simple());
        let url = self.database_url(&database)?;

        let pool = self.admin_pool().await?;
        sqlx::query(&format!("CREATE DATABASE `{}`", database))
            .execute(&pool)
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!("Failed to create database {}: {}", database, e))
            })?;
        pool.close().await;

        Ok(BackendResource {
            url,
            resource: database,
        })
    }

    async fn stop(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        let pool = self.admin_pool().await?;
        sqlx::query(&format!("DROP DATABASE IF EXISTS `{}`", descriptor.resource))
            .execute(&pool)
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!(
                    "Failed to drop database {}: {}",
                    descriptor.resource, e
                ))
            })?;
        pool.close().await;
        Ok(())
    }
}

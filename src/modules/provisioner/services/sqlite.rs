use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use uuid::Uuid;

use super::backend::{BackendResource, DependencyBackend};
use crate::core::{HarnessError, Result};
use crate::modules::provisioner::models::{ConnectionDescriptor, DependencyKind};

/// Ephemeral SQLite databases, one file each, under a per-run temp directory.
///
/// Dropping the backend removes the directory and anything a cancelled
/// start left behind.
pub struct SqliteBackend {
    root: TempDir,
}

impl SqliteBackend {
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("paytrust-harness-")
            .tempdir()
            .map_err(|e| {
                HarnessError::Provisioning(format!("Failed to create temp directory: {}", e))
            })?;

        Ok(Self { root })
    }

    fn database_path(&self) -> PathBuf {
        self.root
            .path()
            .join(format!("db_{}.sqlite", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl DependencyBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn supports(&self, kind: DependencyKind) -> bool {
        matches!(kind, DependencyKind::RelationalStore)
    }

    async fn start(&self, _kind: DependencyKind) -> Result<BackendResource> {
        let path = self.database_path();

        // Creating the pool creates the file; a round-trip proves it is usable
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!(
                    "Failed to create SQLite database {}: {}",
                    path.display(),
                    e
                ))
            })?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        pool.close().await;

        Ok(BackendResource {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            resource: path.display().to_string(),
        })
    }

    async fn stop(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let file = format!("{}{}", descriptor.resource, suffix);
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(HarnessError::Provisioning(format!(
                        "Failed to remove {}: {}",
                        file, e
                    )))
                }
            }
        }
        Ok(())
    }
}

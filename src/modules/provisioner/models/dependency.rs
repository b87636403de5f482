use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of ephemeral backing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    RelationalStore,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::RelationalStore => write!(f, "relational-store"),
        }
    }
}

/// Lifecycle of a provisioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Starting,
    Ready,
    Stopped,
}

/// How dependent code reaches a provisioned resource.
///
/// Stable for the lifetime of the dependency: every field is fixed at
/// acquisition and the same descriptor is handed to every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub id: Uuid,
    pub kind: DependencyKind,
    /// Connection URL (sqlx-compatible)
    pub url: String,
    /// Backend-specific name of the resource (file path, database, container id)
    pub resource: String,
}

/// What to provision alongside the bare resource
#[derive(Debug, Clone, Default)]
pub struct DependencySpec {
    /// Statements executed once the database is reachable
    pub bootstrap_sql: Vec<String>,
}

impl DependencySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bootstrap_sql
            .extend(statements.into_iter().map(Into::into));
        self
    }
}

/// Provisioner-side record of one dependency
#[derive(Debug, Clone)]
pub struct ProvisionedDependency {
    pub descriptor: ConnectionDescriptor,
    pub state: LifecycleState,
    pub acquired_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl ProvisionedDependency {
    pub fn starting(descriptor: ConnectionDescriptor) -> Self {
        Self {
            descriptor,
            state: LifecycleState::Starting,
            acquired_at: Utc::now(),
            released_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state != LifecycleState::Stopped
    }
}

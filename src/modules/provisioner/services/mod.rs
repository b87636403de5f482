pub mod backend;
#[cfg(feature = "containers")]
pub mod container;
pub mod mysql;
pub mod provisioner;
pub mod sqlite;

pub use backend::{backend_from_config, BackendResource, DependencyBackend};
#[cfg(feature = "containers")]
pub use container::ContainerBackend;
pub use mysql::MySqlBackend;
pub use provisioner::DependencyProvisioner;
pub use sqlite::SqliteBackend;

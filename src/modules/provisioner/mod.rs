pub mod models;
pub mod services;

pub use models::{ConnectionDescriptor, DependencyKind, DependencySpec, LifecycleState};
pub use services::{DependencyBackend, DependencyProvisioner};

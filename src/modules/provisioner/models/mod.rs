pub mod dependency;

pub use dependency::{
    ConnectionDescriptor, DependencyKind, DependencySpec, LifecycleState, ProvisionedDependency,
};

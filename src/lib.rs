//! PayTrust integration-test harness
//!
//! Provisions disposable databases and a scripted mock upstream, runs a
//! black-box subject against them and reports what it observed.

pub mod config;
pub mod core;
pub mod modules;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use core::{HarnessError, Result};
pub use modules::mock_upstream;
pub use modules::orchestrator;
pub use modules::payments;
pub use modules::provisioner;

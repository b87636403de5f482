pub mod assertions;
pub mod orchestrator;
pub mod subject;

pub use orchestrator::TestOrchestrator;
pub use subject::{send_request, CaseEnvironment, FnSubject, HttpSubject, Subject};

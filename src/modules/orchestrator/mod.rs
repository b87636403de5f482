pub mod models;
pub mod services;

pub use models::{
    CaseReport, CaseStatus, Stage, SubjectRequest, SubjectResponse, SuiteReport, TestCase,
};
pub use services::{CaseEnvironment, FnSubject, HttpSubject, Subject, TestOrchestrator};

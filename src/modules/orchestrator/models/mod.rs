pub mod case;
pub mod outcome;
pub mod report;

pub use crate::config::IsolationPolicy;
pub use case::{
    InteractionExpectation, ResponseExpectation, StateExpectation, StubDefinition, SubjectRequest,
    SubjectResponse, TestCase,
};
pub use outcome::{AssertionOutcome, CaseFailure, CaseReport, CaseStatus, Stage};
pub use report::{SuiteReport, SuiteSummary};

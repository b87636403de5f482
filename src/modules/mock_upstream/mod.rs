pub mod controllers;
pub mod models;
pub mod services;

pub use models::{CannedResponse, InboundRequest, RecordedInteraction, RequestMatcher, Times};
pub use services::{MockUpstreamServer, RecordedRequests};

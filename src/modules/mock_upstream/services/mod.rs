pub mod journal;
pub mod mock_server;
pub mod state;

pub use journal::{Journal, RecordedRequests};
pub use mock_server::MockUpstreamServer;
pub use state::MockState;

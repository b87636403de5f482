pub mod mock_upstream;
pub mod orchestrator;
pub mod payments;
pub mod provisioner;

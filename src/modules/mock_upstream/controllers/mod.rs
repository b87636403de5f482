pub mod stub_handler;

pub use stub_handler::StubError;

//! Test utilities shared across crate-level unit tests.

pub mod http;
pub mod logging;
pub mod transport;

pub use http::{start_mock_server, try_start_mock_server};
pub use logging::CaptureLogger;
pub use transport::RecordingSender;

pub mod health;
pub mod loadtest;

pub use health::health_handler;
pub use loadtest::loadtest_stream_handler;

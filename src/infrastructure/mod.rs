//! Infrastructure: configuration loading, logging setup, and the retry
//! policy shared by background workers.

pub mod config;
pub mod logging;
pub mod retry;

pub use config::{ConfigError, ConfigLoader};
pub use retry::RetryPolicy;

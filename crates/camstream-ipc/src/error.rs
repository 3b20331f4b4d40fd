//! Error types for configuration values.

use thiserror::Error;

/// Errors reported by [`StreamConfig::validate`](crate::StreamConfig::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric field that must be positive is zero.
    #[error("Invalid configuration: {field} must be positive")]
    NotPositive { field: &'static str },
}

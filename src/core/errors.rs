/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for condition variable operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for configuration loading and validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Condition variable errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Failed to allocate native {resource} (code {code})")]
    #[diagnostic(
        code(sync::resource_allocation),
        help("The host refused to create the wait/notify resource. This is not retried.")
    )]
    ResourceAllocation { resource: String, code: i32 },

    #[error("Native timed wait failed with code {code}")]
    #[diagnostic(
        code(sync::wait_failed),
        help("The native timed wait returned neither success nor a timeout. The mutex is still held.")
    )]
    WaitFailed { code: i32 },
}

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid port range: min {min} > max {max}")]
    #[diagnostic(
        code(config::invalid_port_range),
        help("min_port must not exceed max_port.")
    )]
    InvalidPortRange { min: u16, max: u16 },

    #[error("Port offset {offset} is outside the range {min}..={max}")]
    #[diagnostic(
        code(config::port_out_of_range),
        help("Widen the port range or use a smaller offset.")
    )]
    PortOutOfRange { offset: u16, min: u16, max: u16 },

    #[error("Invalid value for {key}: {value}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Environment overrides must be plain unsigned integers.")
    )]
    InvalidValue { key: String, value: String },

    #[error("Failed to read configuration: {0}")]
    #[diagnostic(code(config::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(
        code(config::parse),
        help("Expected a JSON object with min_port, max_port and bind_retry_count.")
    )]
    Parse(#[from] serde_json::Error),
}

//! Device error types following panic-free policy.

use thiserror::Error;

use crate::supply::Operation;

/// Errors reported by a power supply driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device answered but refused the operation
    #[error("Device rejected {operation}")]
    Rejected { operation: Operation },

    /// A setpoint is outside what the device accepts
    #[error("{field} value {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// No usable answer arrived from the device
    #[error("Device did not respond to {operation}: {reason}")]
    NoResponse {
        operation: Operation,
        reason: String,
    },

    /// The device answered with something the driver could not decode
    #[error("Malformed response to {operation}: {reason}")]
    MalformedResponse {
        operation: Operation,
        reason: String,
    },

    /// Transport-level failure talking to the device
    #[error("Device I/O error: {0}")]
    Io(String),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

//! Core domain errors.

use thiserror::Error;

/// Errors produced while decoding, dispatching, or executing a check.
///
/// The Display string of a variant is what ends up in the `error` field
/// of an emitted response record, so messages are written for operators
/// reading result streams, not for developers reading panics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    /// The check's spec payload could not be decoded into a known type.
    #[error("Spec decode error: {0}")]
    SpecDecode(String),

    /// The check's target could not be resolved to endpoints.
    #[error("Target resolution failed: {0}")]
    Resolution(String),

    /// No worker pool is registered for the request type.
    #[error("No worker registered for request type: {0}")]
    DispatchType(String),

    /// The target cannot be probed as given.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Connection-level failure talking to the endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint spoke, but not the protocol we expected.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A time budget expired before the probe finished.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The run was cancelled before the probe finished.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_wire_string() {
        let err = CheckError::Network("connection refused".to_owned());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_timeout_display() {
        let err = CheckError::Timeout("deadline exceeded".to_owned());
        assert_eq!(err.to_string(), "Timed out: deadline exceeded");
    }
}

// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the OpenCLI daemon core.
//!
//! This module provides a hierarchy of error types for better error handling
//! and programmatic error inspection. All errors implement `Display` and can
//! be converted to/from `String` for backward compatibility with the
//! domain/task protocol, where errors are surfaced as plain strings inside a
//! [`crate::task::TaskResult`] rather than thrown.

use thiserror::Error;

/// Main error type for OpenCLI daemon core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Invalid task parameters
    /// - Malformed pipeline structure (dangling edge, duplicate node id)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime processing error during normal operation.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network-related error (HTTP, WebSocket, subprocess I/O).
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication failure. Never surfaced with the underlying reason
    /// (see §4.A of the daemon's auth contract): callers only see `invalid`.
    #[error("Authentication failed")]
    AuthFailed,

    /// I/O error (file operations, device access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource exhaustion or limit exceeded.
    #[error("Resource exhaustion: {0}")]
    ResourceExhausted(String),
}

/// Convenience type alias for Results using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<CoreError> for String {
    fn from(err: CoreError) -> Self {
        err.to_string()
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable_for_each_variant() {
        assert_eq!(
            CoreError::Configuration("bad node".into()).to_string(),
            "Configuration error: bad node"
        );
        assert_eq!(CoreError::Runtime("oops".into()).to_string(), "Runtime error: oops");
        assert_eq!(CoreError::AuthFailed.to_string(), "Authentication failed");
    }

    #[test]
    fn string_round_trips_through_runtime_variant() {
        let err: CoreError = "something broke".into();
        assert_eq!(err.to_string(), "Runtime error: something broke");
        let s: String = err.into();
        assert_eq!(s, "Runtime error: something broke");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}

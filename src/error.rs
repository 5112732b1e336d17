//! Error types for resplink
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::ReplyKind;

/// Result type alias using RespError
pub type Result<T> = std::result::Result<T, RespError>;

/// Unified error type for resplink operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RespError {
    // -------------------------------------------------------------------------
    // Session Errors (fatal)
    // -------------------------------------------------------------------------
    /// The transport could not be established; no session exists.
    #[error("Connect error: {0}")]
    Connect(String),

    /// The transport failed while in use. The session is closed for good.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The session already observed a fatal error and refuses further work.
    #[error("Session poisoned: {0}")]
    Poisoned(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// Bytes on the wire could not be decoded as RESP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error status (`-ERR ...`).
    #[error("Remote error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Projection Errors
    // -------------------------------------------------------------------------
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ReplyKind,
        actual: ReplyKind,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RespError {
    /// Whether this error ends the session that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RespError::Connect(_) | RespError::ConnectionLost(_) | RespError::Poisoned(_)
        )
    }

    /// Whether the caller can keep using the session after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RespError::Remote(_) | RespError::TypeMismatch { .. })
    }

    pub(crate) fn lost(err: &std::io::Error) -> Self {
        RespError::ConnectionLost(err.to_string())
    }
}

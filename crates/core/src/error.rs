//! Error types for the provisioning core.

use thiserror::Error;

use crate::inventory::NumberStatus;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in session orchestration and the lifecycle engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The admin shell process could not be started.
    #[error("spawn failure: {0}")]
    Spawn(String),

    /// Session never reached the connected state in time.
    #[error("connection timeout: session {session} not connected after {timeout_secs}s")]
    ConnectTimeout { session: String, timeout_secs: u64 },

    /// Session entered a terminal state while we were waiting on it.
    #[error("session {session} failed while connecting: {reason}")]
    ConnectFailed { session: String, reason: String },

    /// No completion marker arrived within the bounded wait.
    #[error("timed out awaiting completion of command {token} after {timeout_secs}s")]
    CompletionTimeout { token: String, timeout_secs: u64 },

    /// A specific step of a compound command failed.
    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// Structured payload from the host failed to parse.
    #[error("could not interpret host response: {0}")]
    MalformedPayload(String),

    /// Lifecycle operation requested on a record not in the required state.
    #[error("invalid transition for {line}: {from:?} -> {to:?}")]
    InvalidTransition {
        line: String,
        from: NumberStatus,
        to: NumberStatus,
    },

    /// Line identifier is not a valid E.164 number.
    #[error("invalid line identifier '{0}': expected E.164 form like +15551230000")]
    InvalidLineUri(String),

    /// A record with this (tenant, line) pair already exists.
    #[error("line {line} already exists for tenant {tenant}")]
    DuplicateLine { tenant: String, line: String },

    /// Operation referenced a session, record, or credential that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Session is gone or refused the command.
    #[error("session {0} is closed or unknown")]
    SessionClosed(String),

    /// Runtime-layer failure (host location, transport, executor).
    #[error(transparent)]
    Runtime(#[from] line_runtime::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for either bounded-wait timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::ConnectTimeout { .. } | Error::CompletionTimeout { .. } => true,
            Error::Runtime(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true when the failure was rejected before any external call.
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            Error::InvalidTransition { .. }
                | Error::InvalidLineUri(_)
                | Error::DuplicateLine { .. }
                | Error::NotFound(_)
        )
    }
}

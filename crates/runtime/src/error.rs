//! Error types for the admin-shell runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the admin-shell runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Admin shell binary was not found.
    #[error(
        "admin shell not found. Install PowerShell 7+ or set LINECTL_SHELL_EXE to the binary path"
    )]
    HostNotFound,

    /// The current environment structurally cannot run the admin shell.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// Failed to launch the admin shell process.
    #[error("failed to launch admin shell: {0}")]
    LaunchFailed(String),

    /// Script execution exceeded its deadline.
    #[error("script timed out after {timeout_secs}s")]
    ExecTimeout { timeout_secs: u64 },

    /// Transport-level error (stdio communication).
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel closed unexpectedly.
    #[error("channel closed unexpectedly")]
    ChannelClosed,
}

impl Error {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ExecTimeout { .. })
    }

    /// Returns true when the failure happened before any process was spawned.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(self, Error::HostNotFound | Error::UnsupportedEnvironment(_))
    }
}

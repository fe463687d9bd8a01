//! Interactive admin-shell sessions.
//!
//! A session is one long-lived interactive shell process plus the state
//! machine layered over its output:
//!
//! ```text
//! connecting ──> awaiting_mfa ──> connected ──> disconnected
//!      │              │               │
//!      └──────────────┴───────────────┴──────> error
//! ```
//!
//! Certificate-authenticated sessions skip `awaiting_mfa` entirely. Both
//! `disconnected` and `error` are terminal; a session id is never revived.

pub mod completion;
pub mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use completion::{CompletionOutcome, wait_for_completion, wait_for_connected};
pub use registry::SessionRegistry;

/// Opaque session identifier. Unix-millis plus a process-local counter;
/// never reused within or across registries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

static SESSION_COUNTER: AtomicU32 = AtomicU32::new(0);

impl SessionId {
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("s-{millis:x}-{n:04x}"))
    }

    /// Wraps a caller-supplied id verbatim (registry lookups from text
    /// input; an unknown id simply misses).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session is in its connect lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    AwaitingMfa,
    Connected,
    Disconnected,
    Error,
}

impl SessionState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingMfa => "awaiting_mfa",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// How the session authenticates to the admin shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum AuthMethod {
    /// Username-driven interactive sign-in; may prompt for an MFA code.
    Interactive,
    /// Certificate sign-in; no interactive prompts ever appear.
    Certificate { thumbprint: String },
}

/// Everything needed to open one session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub tenant_id: String,
    pub username: String,
    pub auth: AuthMethod,
}

/// Snapshot of one live session for introspection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub tenant_id: String,
    pub username: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Per-session event stream, delivered in emission order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// One line of shell output (echo lines included).
    Output(String),
    StateChanged(SessionState),
}

/// Heuristic detector for interactive MFA prompts.
///
/// The shell's sign-in flow prints its prompts as free text with no stable
/// format, so detection is pattern matching, nothing more. False negatives
/// surface as a connect timeout; false positives only delay the connected
/// transition until the ready banner arrives.
#[derive(Debug, Clone)]
pub struct MfaDetector {
    patterns: Vec<String>,
}

impl Default for MfaDetector {
    fn default() -> Self {
        Self {
            patterns: vec![
                "verification code".to_string(),
                "enter the code".to_string(),
                "mfa".to_string(),
                "multi-factor".to_string(),
            ],
        }
    }
}

impl MfaDetector {
    pub fn with_patterns(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Does this output line look like an MFA prompt?
    pub fn matches(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        if self.patterns.iter().any(|p| lower.contains(p.as_str())) {
            return true;
        }
        // A bare six-digit token on its own line is how some sign-in flows
        // present the number-matching prompt.
        let trimmed = line.trim();
        trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_digit())
    }
}

/// Explicit ready banner printed by the connect script once the tenant
/// session is established.
pub const READY_BANNER: &str = "LINECTL_READY";

/// Does this stderr line indicate the shell cannot recover?
///
/// Same caveats as [`MfaDetector`]: the shell prints free text, so this is
/// pattern matching. A missed fatal line leaves the session in `connecting`
/// until the connect timeout; a false positive fails a session that would
/// have failed its command anyway.
pub fn is_fatal_error(line: &str) -> bool {
    const FATAL_PATTERNS: &[&str] = &[
        "authentication failed",
        "login failed",
        "access denied",
        "unauthorized",
        "unhandled exception",
    ];
    let lower = line.to_lowercase();
    FATAL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Does this line indicate the session reached the tenant?
///
/// Primary signal is the explicit ready banner; the tenant-name banner some
/// shell versions print on their own is accepted as a fallback.
pub fn is_connected_banner(line: &str, tenant_id: &str) -> bool {
    if line.contains(READY_BANNER) {
        return true;
    }
    let lower = line.to_lowercase();
    lower.contains("connected to") && lower.contains(&tenant_id.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn mfa_detector_matches_prompts_and_bare_codes() {
        let det = MfaDetector::default();
        assert!(det.matches("Enter the verification code sent to your device"));
        assert!(det.matches("MFA required for admin@contoso.com"));
        assert!(det.matches("  493021  "));
        assert!(!det.matches("Loading modules..."));
        assert!(!det.matches("4930211")); // seven digits
    }

    #[test]
    fn connected_banner_detection() {
        assert!(is_connected_banner("LINECTL_READY", "contoso"));
        assert!(is_connected_banner("Connected to CONTOSO admin endpoint", "contoso"));
        assert!(!is_connected_banner("Connected to fabrikam", "contoso"));
        assert!(!is_connected_banner("Signing in...", "contoso"));
    }

    #[test]
    fn fatal_error_detection() {
        assert!(is_fatal_error("Connect-LineAdmin : Authentication failed for admin@contoso.com"));
        assert!(is_fatal_error("ACCESS DENIED"));
        assert!(is_fatal_error("An unhandled exception occurred"));
        assert!(!is_fatal_error("WARNING: module load took 4s"));
        assert!(!is_fatal_error("Signing in..."));
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Disconnected.is_terminal());
        assert!(SessionState::Error.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(!SessionState::AwaitingMfa.is_terminal());
    }
}

//! Completion tokens and the marker-line vocabulary.
//!
//! Every marker the generated scripts emit carries the invocation's token as
//! a suffix. Two compound operations whose output interleaves on a shared
//! stream therefore can never match each other's markers.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Sentinel opening a framed JSON payload (token-suffixed).
pub const JSON_BEGIN: &str = "LINECTL_JSON_BEGIN";
/// Sentinel closing a framed JSON payload (token-suffixed).
pub const JSON_END: &str = "LINECTL_JSON_END";
/// Per-step success marker: `LINECTL_STEP_OK_<step>_<token>`.
pub const STEP_OK: &str = "LINECTL_STEP_OK";
/// Per-step failure marker: `LINECTL_STEP_ERR_<step>_<token>: <message>`.
pub const STEP_ERR: &str = "LINECTL_STEP_ERR";
/// Overall success marker.
pub const RESULT_SUCCESS: &str = "LINECTL_RESULT_SUCCESS";
/// Overall failure marker.
pub const RESULT_FAILED: &str = "LINECTL_RESULT_FAILED";
/// End-of-block marker, always emitted last.
pub const DONE: &str = "LINECTL_DONE";

static TOKEN_SEQ: AtomicU32 = AtomicU32::new(0);

/// Unique correlation token for one command invocation.
///
/// Derived from the current unix-millis plus a process-local counter, so
/// tokens are unique per outstanding command even when two are generated in
/// the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionToken(String);

impl CompletionToken {
    /// Generates a fresh token.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{millis:x}{seq:04x}"))
    }

    /// Wraps a caller-supplied token verbatim.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single output line classified against one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLine {
    JsonBegin,
    JsonEnd,
    /// `LINECTL_STEP_OK_<step>_<token>`
    StepOk { step: String },
    /// `LINECTL_STEP_ERR_<step>_<token>: <message>`
    StepErr { step: String, message: String },
    ResultSuccess,
    ResultFailed,
    Done,
}

impl MarkerLine {
    /// Classifies `line` against `token`. Returns `None` for ordinary output
    /// and for markers carrying a different token.
    pub fn parse(line: &str, token: &CompletionToken) -> Option<Self> {
        let line = line.trim();
        let tok = token.as_str();

        if line == format!("{JSON_BEGIN}_{tok}") {
            return Some(Self::JsonBegin);
        }
        if line == format!("{JSON_END}_{tok}") {
            return Some(Self::JsonEnd);
        }
        if line == format!("{RESULT_SUCCESS}_{tok}") {
            return Some(Self::ResultSuccess);
        }
        if line == format!("{RESULT_FAILED}_{tok}") {
            return Some(Self::ResultFailed);
        }
        if line == format!("{DONE}_{tok}") {
            return Some(Self::Done);
        }

        if let Some(rest) = line.strip_prefix(STEP_OK).and_then(|r| r.strip_prefix('_')) {
            if let Some(step) = rest.strip_suffix(&format!("_{tok}")) {
                return Some(Self::StepOk {
                    step: step.to_string(),
                });
            }
        }

        if let Some(rest) = line.strip_prefix(STEP_ERR).and_then(|r| r.strip_prefix('_')) {
            // `<step>_<token>: <message>`
            let (head, message) = match rest.split_once(": ") {
                Some((head, message)) => (head, message.to_string()),
                None => (rest, String::new()),
            };
            if let Some(step) = head.strip_suffix(&format!("_{tok}")) {
                return Some(Self::StepErr {
                    step: step.to_string(),
                    message,
                });
            }
        }

        None
    }
}

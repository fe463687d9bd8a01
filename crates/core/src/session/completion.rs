//! Bounded waits over session output.
//!
//! The shell gives no structured acknowledgement that a command finished, so
//! completion is detected by polling the session's accumulated output for
//! the invocation's token-suffixed markers. Both waits here are bounded; a
//! session that times out is discarded by its caller, never reused.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use line_protocol::{CompletionToken, MarkerLine, is_echo_line};

use crate::error::{Error, Result};

use super::{SessionId, SessionRegistry, SessionState};

const CONNECT_POLL: Duration = Duration::from_millis(50);

/// How a compound command concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Success,
    /// The named step failed; later steps were skipped by the script.
    StepFailed { step: String, message: String },
    /// Overall failure marker with no step attribution.
    Failed,
    /// No conclusive marker arrived within the bounded wait.
    TimedOut,
}

/// Waits for the session to reach `Connected`, bounded by the configured
/// connect timeout.
///
/// # Errors
///
/// [`Error::ConnectFailed`] when the session disappears or lands in a
/// terminal state first; [`Error::ConnectTimeout`] at the deadline.
pub async fn wait_for_connected(registry: &SessionRegistry, id: &SessionId) -> Result<()> {
    let timeout = registry.config().connect_timeout;
    let deadline = Instant::now() + timeout;

    loop {
        match registry.state(id) {
            Some(SessionState::Connected) => return Ok(()),
            Some(state) if state.is_terminal() => {
                return Err(Error::ConnectFailed {
                    session: id.to_string(),
                    reason: format!("session entered {state} while connecting"),
                });
            }
            Some(_) => {}
            None => {
                return Err(Error::ConnectFailed {
                    session: id.to_string(),
                    reason: "session was closed while connecting".to_string(),
                });
            }
        }

        if Instant::now() >= deadline {
            return Err(Error::ConnectTimeout {
                session: id.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(CONNECT_POLL).await;
    }
}

/// Polls the session's output for `token`'s completion markers.
///
/// Success is either the overall success marker or a success marker for
/// every step in `steps`. Any step-error or overall-failure marker concludes
/// immediately. Partial progress (some steps acknowledged, the rest silent)
/// runs out the clock and reports [`CompletionOutcome::TimedOut`].
pub async fn wait_for_completion(
    registry: &SessionRegistry,
    id: &SessionId,
    token: &CompletionToken,
    steps: &[String],
) -> CompletionOutcome {
    let deadline = Instant::now() + registry.config().completion_timeout;

    loop {
        let lines = registry.output_snapshot(id).unwrap_or_default();
        let mut acknowledged: HashSet<&str> = HashSet::new();
        let mut overall_success = false;

        // Echo lines are the host typing our own script back; they never
        // count as markers.
        for line in lines.iter().filter(|l| !is_echo_line(l)) {
            match MarkerLine::parse(line, token) {
                Some(MarkerLine::StepOk { step }) => {
                    if let Some(known) = steps.iter().find(|s| **s == step) {
                        acknowledged.insert(known.as_str());
                    }
                }
                Some(MarkerLine::StepErr { step, message }) => {
                    return CompletionOutcome::StepFailed { step, message };
                }
                Some(MarkerLine::ResultFailed) => return CompletionOutcome::Failed,
                Some(MarkerLine::ResultSuccess) => overall_success = true,
                _ => {}
            }
        }

        if overall_success || (!steps.is_empty() && acknowledged.len() == steps.len()) {
            return CompletionOutcome::Success;
        }

        if Instant::now() >= deadline {
            return CompletionOutcome::TimedOut;
        }
        tokio::time::sleep(registry.config().completion_poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{AuthMethod, SessionSpec};

    fn fast_registry() -> SessionRegistry {
        let mut config = Config::default();
        config.connect_timeout = Duration::from_millis(200);
        config.completion_timeout = Duration::from_millis(200);
        config.completion_poll = Duration::from_millis(20);
        SessionRegistry::new(config)
    }

    fn spec() -> SessionSpec {
        SessionSpec {
            tenant_id: "contoso".to_string(),
            username: "admin@contoso.com".to_string(),
            auth: AuthMethod::Interactive,
        }
    }

    fn steps() -> Vec<String> {
        vec!["phone".to_string(), "policy".to_string()]
    }

    #[tokio::test]
    async fn connected_wait_succeeds_once_banner_arrives() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        reg.inject_output(&id, "LINECTL_READY\n");
        wait_for_connected(&reg, &id).await.unwrap();
    }

    #[tokio::test]
    async fn connected_wait_times_out() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let err = wait_for_connected(&reg, &id).await.unwrap_err();
        assert!(matches!(err, Error::ConnectTimeout { .. }));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn connected_wait_fails_fast_when_session_closes() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        reg.close_session(&id).await;
        let err = wait_for_connected(&reg, &id).await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn all_step_markers_mean_success() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("t1");

        reg.inject_output(&id, "LINECTL_STEP_OK_phone_t1\nLINECTL_STEP_OK_policy_t1\n");
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(outcome, CompletionOutcome::Success);
    }

    #[tokio::test]
    async fn overall_success_marker_is_sufficient() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("t2");

        reg.inject_output(&id, "LINECTL_RESULT_SUCCESS_t2\nLINECTL_DONE_t2\n");
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(outcome, CompletionOutcome::Success);
    }

    #[tokio::test]
    async fn step_error_reports_which_step_and_why() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("t3");

        reg.inject_output(
            &id,
            "LINECTL_STEP_OK_phone_t3\nLINECTL_STEP_ERR_policy_t3: no such policy\n",
        );
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(
            outcome,
            CompletionOutcome::StepFailed {
                step: "policy".to_string(),
                message: "no such policy".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn partial_markers_run_out_the_clock() {
        // The phone step acknowledged, the policy step silent. No failure
        // marker ever arrives, so the bounded wait must expire.
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("t4");

        reg.inject_output(&id, "LINECTL_STEP_OK_phone_t4\n");
        let started = std::time::Instant::now();
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(outcome, CompletionOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn connected_wait_fails_fast_on_fatal_shell_error() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        reg.inject_stderr(&id, "Connect-LineAdmin : Authentication failed\n");
        let err = wait_for_connected(&reg, &id).await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn echoed_markers_never_conclude_the_wait() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("t5");

        reg.inject_output(
            &id,
            "PS C:\\> LINECTL_RESULT_SUCCESS_t5\n>> LINECTL_STEP_OK_phone_t5\n",
        );
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(outcome, CompletionOutcome::TimedOut);
    }

    #[tokio::test]
    async fn foreign_token_markers_are_ignored() {
        let reg = fast_registry();
        let (id, _stdin) = reg.create_detached_session(spec());
        let token = CompletionToken::from_raw("mine");

        reg.inject_output(
            &id,
            "LINECTL_RESULT_SUCCESS_theirs\nLINECTL_STEP_ERR_phone_theirs: boom\n",
        );
        let outcome = wait_for_completion(&reg, &id, &token, &steps()).await;
        assert_eq!(outcome, CompletionOutcome::TimedOut);
    }
}

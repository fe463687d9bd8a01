//! End-to-end number assignment.
//!
//! One assignment is one session: open, sign in, run the compound
//! assign-line-and-policy command, reconcile the inventory, tear down. The
//! session is closed on every branch, success or not; inventory updates only
//! happen after the shell acknowledged the mutation, so a failure here never
//! leaves the inventory claiming a state the platform does not have.

use tracing::{info, warn};

use line_protocol::{CompletionToken, CompoundScript};

use crate::error::{Error, Result};
use crate::inventory::{NumberStatus, PhoneNumber, normalize_line_uri};
use crate::lifecycle::{Assignment, LifecycleEngine};
use crate::session::{
    AuthMethod, CompletionOutcome, SessionId, SessionRegistry, wait_for_completion,
    wait_for_connected,
};

/// One requested number assignment.
#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub tenant_id: String,
    /// Admin account the session signs in as; also the audit author.
    pub operator: String,
    pub auth: AuthMethod,
    /// Target user receiving the number.
    pub user_principal: String,
    pub user_display_name: String,
    pub line_uri: String,
    pub routing_policy: Option<String>,
}

/// What a successful assignment did.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub session: SessionId,
    /// Line the user previously held, released back to the pool when it
    /// differs from the new one.
    pub previous_line: Option<String>,
    pub record: PhoneNumber,
}

/// Assigns `request.line_uri` to `request.user_principal`.
///
/// Opens a fresh session, waits for it to connect, runs the compound
/// command, and on shell success reconciles the inventory: the user's old
/// line (if different) goes straight back to `Available`, the new line is
/// marked `Used`. The session is closed before this returns, on every
/// branch.
///
/// # Errors
///
/// Fail-fast rejections (`NotFound`, `InvalidTransition`) happen before any
/// process is spawned. After that, each failure keeps its cause: connect
/// timeout, completion timeout, or the named failing step.
pub async fn assign_number(
    registry: &SessionRegistry,
    engine: &LifecycleEngine,
    request: AssignmentRequest,
) -> Result<AssignmentOutcome> {
    precheck_target(engine, &request).await?;

    let session = match &request.auth {
        AuthMethod::Interactive => {
            registry
                .create_session(request.tenant_id.as_str(), request.operator.as_str())
                .await?
        }
        AuthMethod::Certificate { thumbprint } => {
            registry
                .create_session_with_certificate(
                    request.tenant_id.as_str(),
                    request.operator.as_str(),
                    thumbprint.as_str(),
                )
                .await?
        }
    };

    run_on_session(registry, engine, &session, &request).await
}

/// Target record must exist and not be cooling off. Checked before the
/// session spawn so bad requests cost nothing.
async fn precheck_target(engine: &LifecycleEngine, request: &AssignmentRequest) -> Result<()> {
    let line = normalize_line_uri(&request.line_uri)?;
    let record = engine
        .store()
        .get_by_line(&request.tenant_id, &line)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("number {line} for tenant {}", request.tenant_id))
        })?;
    if record.status == NumberStatus::Aging {
        return Err(Error::InvalidTransition {
            line: record.line_uri,
            from: record.status,
            to: NumberStatus::Used,
        });
    }
    Ok(())
}

async fn run_on_session(
    registry: &SessionRegistry,
    engine: &LifecycleEngine,
    session: &SessionId,
    request: &AssignmentRequest,
) -> Result<AssignmentOutcome> {
    let line = normalize_line_uri(&request.line_uri)?;
    let previous = engine
        .store()
        .get_by_assignee(&request.tenant_id, &request.user_principal)
        .await?;

    let shell_result = drive_shell(registry, session, request, &line).await;
    registry.close_session(session).await;
    if let Err(e) = &shell_result {
        warn!(target = "linectl.assign", session = %session, error = %e, "assignment failed");
    }
    shell_result?;

    // The platform holds the new state; reconcile the inventory to match.
    let previous_line = previous.as_ref().map(|p| p.line_uri.clone());
    if let Some(prev) = &previous {
        if prev.line_uri != line {
            engine
                .release_immediately(&request.tenant_id, &prev.line_uri, &request.operator)
                .await?;
        }
    }
    let record = engine
        .mark_used(
            &request.tenant_id,
            &line,
            Assignment {
                display_name: request.user_display_name.clone(),
                principal: request.user_principal.clone(),
                routing_policy: request.routing_policy.clone(),
            },
            &request.operator,
        )
        .await?;

    info!(
        target = "linectl.assign",
        tenant = %request.tenant_id,
        user = %request.user_principal,
        line = %line,
        previous = previous_line.as_deref().unwrap_or("none"),
        "number assigned"
    );

    Ok(AssignmentOutcome {
        session: session.clone(),
        previous_line,
        record,
    })
}

async fn drive_shell(
    registry: &SessionRegistry,
    session: &SessionId,
    request: &AssignmentRequest,
    line: &str,
) -> Result<()> {
    wait_for_connected(registry, session).await?;

    let _guard = registry
        .lock_commands(session)
        .await
        .ok_or_else(|| Error::SessionClosed(session.to_string()))?;

    let token = CompletionToken::generate();
    let mut script = CompoundScript::new(token.clone()).step(
        "phone",
        format!(
            "Set-UserLine -Identity '{}' -LineUri '{}'",
            request.user_principal, line
        ),
    );
    if let Some(policy) = &request.routing_policy {
        script = script.step(
            "policy",
            format!(
                "Grant-VoiceRoutingPolicy -Identity '{}' -PolicyName '{}'",
                request.user_principal, policy
            ),
        );
    }
    let steps: Vec<String> = script
        .step_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    if !registry.send_command(session, &script.render()) {
        return Err(Error::SessionClosed(session.to_string()));
    }

    match wait_for_completion(registry, session, &token, &steps).await {
        CompletionOutcome::Success => Ok(()),
        CompletionOutcome::StepFailed { step, message } => Err(Error::StepFailed { step, message }),
        CompletionOutcome::Failed => Err(Error::StepFailed {
            step: "assignment".to_string(),
            message: "host reported failure without step attribution".to_string(),
        }),
        CompletionOutcome::TimedOut => Err(Error::CompletionTimeout {
            token: token.to_string(),
            timeout_secs: registry.config().completion_timeout.as_secs(),
        }),
    }
}

//! Owned registry of live admin-shell sessions.
//!
//! The registry is an explicit service value, constructed once and passed by
//! handle. Each entry owns its child process, its writer channel, and its
//! event fan-out; everything a session needs dies with its entry.
//!
//! Invariant: a closed session id never comes back. `close_session` removes
//! the entry before touching the process, so late output from a dying shell
//! can never resurface a session as connected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use line_protocol::{CompletionToken, FrameEvent, FrameParser, QueryScript};
use line_runtime::{
    HostProcess, PipeTransport, PipeTransportReceiver, environment_supported, locate_admin_shell,
};

use crate::config::Config;
use crate::error::{Error, Result};

use super::{
    AuthMethod, MfaDetector, READY_BANNER, SessionEvent, SessionId, SessionInfo, SessionSpec,
    SessionState, is_connected_banner, is_fatal_error,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct SessionEntry {
    id: SessionId,
    spec: SessionSpec,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    last_activity: Mutex<DateTime<Utc>>,
    /// Echoes included; completion waiting re-parses this buffer.
    output: Mutex<Vec<String>>,
    /// Partial line carried between output chunks.
    carry: Mutex<String>,
    /// Partial line carried between stderr chunks.
    stderr_carry: Mutex<String>,
    events: broadcast::Sender<SessionEvent>,
    writer: mpsc::UnboundedSender<String>,
    process: tokio::sync::Mutex<Option<HostProcess>>,
    /// Serializes compound operations on this session.
    command_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionEntry {
    fn new(id: SessionId, spec: SessionSpec, writer: mpsc::UnboundedSender<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let now = Utc::now();
        Self {
            id,
            spec,
            created_at: now,
            state: Mutex::new(SessionState::Connecting),
            last_activity: Mutex::new(now),
            output: Mutex::new(Vec::new()),
            carry: Mutex::new(String::new()),
            stderr_carry: Mutex::new(String::new()),
            events,
            writer,
            process: tokio::sync::Mutex::new(None),
            command_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            tenant_id: self.spec.tenant_id.clone(),
            username: self.spec.username.clone(),
            state: *self.state.lock(),
            created_at: self.created_at,
            last_activity: *self.last_activity.lock(),
        }
    }
}

/// Registry of live sessions against the external admin shell.
pub struct SessionRegistry {
    config: Config,
    detector: MfaDetector,
    sessions: Arc<RwLock<HashMap<SessionId, Arc<SessionEntry>>>>,
}

impl SessionRegistry {
    pub fn new(config: Config) -> Self {
        Self::with_detector(config, MfaDetector::default())
    }

    pub fn with_detector(config: Config, detector: MfaDetector) -> Self {
        Self {
            config,
            detector,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens an interactive session for `tenant`/`username`.
    ///
    /// Returns once the shell process is up; the sign-in conversation
    /// continues asynchronously. Callers observe progress via
    /// [`SessionRegistry::subscribe`] or a bounded connected wait.
    pub async fn create_session(
        &self,
        tenant_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<SessionId> {
        self.spawn_session(SessionSpec {
            tenant_id: tenant_id.into(),
            username: username.into(),
            auth: AuthMethod::Interactive,
        })
        .await
    }

    /// Opens a certificate-authenticated session. No interactive prompts
    /// appear on this path, so MFA detection is skipped entirely.
    pub async fn create_session_with_certificate(
        &self,
        tenant_id: impl Into<String>,
        username: impl Into<String>,
        thumbprint: impl Into<String>,
    ) -> Result<SessionId> {
        self.spawn_session(SessionSpec {
            tenant_id: tenant_id.into(),
            username: username.into(),
            auth: AuthMethod::Certificate {
                thumbprint: thumbprint.into(),
            },
        })
        .await
    }

    async fn spawn_session(&self, spec: SessionSpec) -> Result<SessionId> {
        environment_supported()?;
        let shell = locate_admin_shell()?;

        let mut process =
            HostProcess::launch(&shell, &["-NoProfile", "-NoExit", "-Command", "-"], &[]).await?;
        let (stdin, stdout, stderr) = process.take_stdio();
        let (stdin, stdout) = match (stdin, stdout) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = process.kill().await;
                return Err(line_runtime::Error::LaunchFailed(
                    "admin shell stdio pipes unavailable".to_string(),
                )
                .into());
            }
        };

        let id = SessionId::new();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();
        let entry = Arc::new(SessionEntry::new(id.clone(), spec, writer_tx));
        *entry.process.lock().await = Some(process);
        self.sessions.write().insert(id.clone(), entry.clone());

        let (transport, mut chunk_rx) = PipeTransport::new(stdin, stdout);
        let (mut sender, mut receiver) = transport.into_parts();

        // stdin pump. A write failure against a live process means the pipe
        // is broken; the session cannot make progress and is failed.
        let writer_entry = entry.clone();
        tokio::spawn(async move {
            while let Some(text) = writer_rx.recv().await {
                if let Err(e) = sender.send(&text).await {
                    warn!(target = "linectl.session", session = %writer_entry.id, error = %e, "stdin write failed");
                    set_state(&writer_entry, SessionState::Error);
                    break;
                }
            }
        });

        // stdout pump
        let reader_session = id.clone();
        tokio::spawn(async move {
            if let Err(e) = receiver.run().await {
                debug!(target = "linectl.session", session = %reader_session, error = %e, "stdout pump ended");
            }
        });

        // stderr pump. Diagnostic text lands in the same output stream; a
        // line matching a fatal pattern fails the session.
        if let Some(stderr) = stderr {
            let (mut err_receiver, mut err_rx) = PipeTransportReceiver::standalone(stderr);
            let err_session = id.clone();
            tokio::spawn(async move {
                if let Err(e) = err_receiver.run().await {
                    debug!(target = "linectl.session", session = %err_session, error = %e, "stderr pump ended");
                }
            });
            let err_entry = entry.clone();
            tokio::spawn(async move {
                while let Some(chunk) = err_rx.recv().await {
                    ingest_stderr_chunk(&err_entry, &chunk);
                }
            });
        }

        // Line assembly and state detection. EOF on stdout is the process
        // exit signal; an exited session leaves the registry.
        let consume_entry = entry.clone();
        let detector = self.detector.clone();
        let sessions = Arc::downgrade(&self.sessions);
        let consume_id = id.clone();
        tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                ingest_chunk(&consume_entry, &detector, &chunk);
            }
            set_state(&consume_entry, SessionState::Disconnected);
            if let Some(sessions) = sessions.upgrade() {
                sessions.write().remove(&consume_id);
            }
        });

        // Kick off the sign-in conversation.
        let _ = entry.writer.send(connect_command(&entry.spec));
        info!(target = "linectl.session", session = %id, tenant = %entry.spec.tenant_id, "session created");

        Ok(id)
    }

    /// Queues command text on the session's stdin.
    ///
    /// Returns `false`, never an error, when the session is absent or in a
    /// terminal state.
    pub fn send_command(&self, id: &SessionId, text: &str) -> bool {
        let entry = self.sessions.read().get(id).cloned();
        match entry {
            Some(entry) if !entry.state.lock().is_terminal() => {
                *entry.last_activity.lock() = Utc::now();
                entry.writer.send(text.to_string()).is_ok()
            }
            _ => false,
        }
    }

    /// Closes the session: graceful exit request, escalating to kill after
    /// the grace period. The entry is removed from the registry first, so
    /// the id is gone no matter how teardown goes.
    pub async fn close_session(&self, id: &SessionId) {
        let Some(entry) = self.sessions.write().remove(id) else {
            return;
        };
        set_state(&entry, SessionState::Disconnected);

        let process = entry.process.lock().await.take();
        if let Some(process) = process {
            if let Err(e) = process.shutdown().await {
                warn!(target = "linectl.session", session = %id, error = %e, "session teardown failed");
            }
        }
        info!(target = "linectl.session", session = %id, "session closed");
    }

    /// Force-closes every session idle past the configured timeout,
    /// regardless of state. Returns how many were reaped.
    pub async fn sweep_idle(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));

        let stale: Vec<SessionId> = self
            .sessions
            .read()
            .values()
            .filter(|e| *e.last_activity.lock() < cutoff)
            .map(|e| e.id.clone())
            .collect();

        for id in &stale {
            info!(target = "linectl.session", session = %id, "reaping idle session");
            self.close_session(id).await;
        }
        stale.len()
    }

    /// Holds the session's compound-command lock for the guard's lifetime.
    /// Two compound operations never interleave on one session.
    pub async fn lock_commands(&self, id: &SessionId) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        let lock = self.sessions.read().get(id)?.command_lock.clone();
        Some(lock.lock_owned().await)
    }

    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.read().get(id).map(|e| *e.state.lock())
    }

    pub fn info(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(|e| e.info())
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> =
            self.sessions.read().values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// All output lines seen so far, echoes included.
    pub fn output_snapshot(&self, id: &SessionId) -> Option<Vec<String>> {
        self.sessions.read().get(id).map(|e| e.output.lock().clone())
    }

    /// Runs a JSON-producing query on the session and returns the framed
    /// payload (object or array).
    ///
    /// Holds the session's command lock for the duration; bounded by the
    /// completion timeout like any other command.
    ///
    /// # Errors
    ///
    /// [`Error::SessionClosed`] when the session is gone or refuses input,
    /// [`Error::MalformedPayload`] when the framed text does not parse, and
    /// [`Error::CompletionTimeout`] when no complete frame arrives in time.
    pub async fn run_query(&self, id: &SessionId, command: &str) -> Result<serde_json::Value> {
        let _guard = self
            .lock_commands(id)
            .await
            .ok_or_else(|| Error::SessionClosed(id.to_string()))?;

        let token = CompletionToken::generate();
        let script = QueryScript::new(token.clone(), command);
        if !self.send_command(id, &script.render()) {
            return Err(Error::SessionClosed(id.to_string()));
        }

        let deadline = tokio::time::Instant::now() + self.config.completion_timeout;
        loop {
            // Re-parse the accumulated output each pass; the parser is cheap
            // and the buffer is small for the lifetime of one command.
            let lines = self.output_snapshot(id).unwrap_or_default();
            let mut parser = FrameParser::new(token.clone());
            for line in &lines {
                for event in parser.feed(&format!("{line}\n")) {
                    match event {
                        FrameEvent::Payload(value) => return Ok(value),
                        FrameEvent::Error(e) => return Err(Error::MalformedPayload(e.to_string())),
                        FrameEvent::Marker(_) => {}
                    }
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::CompletionTimeout {
                    token: token.to_string(),
                    timeout_secs: self.config.completion_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.config.completion_poll).await;
        }
    }

    /// Subscribes to the session's event stream. Dropping the receiver
    /// unsubscribes; a lagging subscriber misses events, never blocks the
    /// session.
    pub fn subscribe(&self, id: &SessionId) -> Option<broadcast::Receiver<SessionEvent>> {
        self.sessions.read().get(id).map(|e| e.events.subscribe())
    }
}

/// The sign-in command queued as the session's first input. Ends by printing
/// the ready banner so connected detection has a deterministic signal.
fn connect_command(spec: &SessionSpec) -> String {
    match &spec.auth {
        AuthMethod::Interactive => format!(
            "Connect-LineAdmin -Tenant '{}' -User '{}'; Write-Output '{READY_BANNER}'",
            spec.tenant_id, spec.username
        ),
        AuthMethod::Certificate { thumbprint } => format!(
            "Connect-LineAdmin -Tenant '{}' -User '{}' -CertificateThumbprint '{}'; Write-Output '{READY_BANNER}'",
            spec.tenant_id, spec.username, thumbprint
        ),
    }
}

fn ingest_stderr_chunk(entry: &SessionEntry, chunk: &str) {
    let mut carry = entry.stderr_carry.lock();
    carry.push_str(chunk);
    while let Some(pos) = carry.find('\n') {
        let line = carry[..pos].trim_end_matches('\r').to_string();
        carry.drain(..=pos);
        apply_stderr_line(entry, line);
    }
}

fn apply_stderr_line(entry: &SessionEntry, line: String) {
    entry.output.lock().push(line.clone());
    *entry.last_activity.lock() = Utc::now();
    let _ = entry.events.send(SessionEvent::Output(line.clone()));

    if is_fatal_error(&line) {
        warn!(target = "linectl.session", session = %entry.id, diagnostic = %line, "fatal shell error");
        set_state(entry, SessionState::Error);
    }
}

fn ingest_chunk(entry: &SessionEntry, detector: &MfaDetector, chunk: &str) {
    let mut carry = entry.carry.lock();
    carry.push_str(chunk);
    while let Some(pos) = carry.find('\n') {
        let line = carry[..pos].trim_end_matches('\r').to_string();
        carry.drain(..=pos);
        apply_line(entry, detector, line);
    }
}

fn apply_line(entry: &SessionEntry, detector: &MfaDetector, line: String) {
    entry.output.lock().push(line.clone());
    *entry.last_activity.lock() = Utc::now();
    let _ = entry.events.send(SessionEvent::Output(line.clone()));

    let current = *entry.state.lock();
    match current {
        SessionState::Connecting | SessionState::AwaitingMfa => {
            if is_connected_banner(&line, &entry.spec.tenant_id) {
                set_state(entry, SessionState::Connected);
            } else if current == SessionState::Connecting
                && entry.spec.auth == AuthMethod::Interactive
                && detector.matches(&line)
            {
                set_state(entry, SessionState::AwaitingMfa);
            }
        }
        _ => {}
    }
}

fn set_state(entry: &SessionEntry, next: SessionState) {
    {
        let mut state = entry.state.lock();
        if state.is_terminal() || *state == next {
            return;
        }
        *state = next;
    }
    debug!(target = "linectl.session", session = %entry.id, state = %next, "state change");
    let _ = entry.events.send(SessionEvent::StateChanged(next));
}

#[cfg(test)]
impl SessionRegistry {
    /// Registers an entry with no backing process. The returned receiver is
    /// the session's stdin; tests assert on what was sent.
    pub(crate) fn create_detached_session(
        &self,
        spec: SessionSpec,
    ) -> (SessionId, mpsc::UnboundedReceiver<String>) {
        let id = SessionId::new();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let entry = Arc::new(SessionEntry::new(id.clone(), spec, writer_tx));
        self.sessions.write().insert(id.clone(), entry);
        (id, writer_rx)
    }

    /// Feeds raw shell output through the same path the stdout pump uses.
    pub(crate) fn inject_output(&self, id: &SessionId, chunk: &str) {
        let entry = self.sessions.read().get(id).cloned();
        if let Some(entry) = entry {
            ingest_chunk(&entry, &self.detector, chunk);
        }
    }

    /// Feeds raw diagnostic text through the same path the stderr pump uses.
    pub(crate) fn inject_stderr(&self, id: &SessionId, chunk: &str) {
        let entry = self.sessions.read().get(id).cloned();
        if let Some(entry) = entry {
            ingest_stderr_chunk(&entry, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Config::default())
    }

    fn interactive_spec() -> SessionSpec {
        SessionSpec {
            tenant_id: "contoso".to_string(),
            username: "admin@contoso.com".to_string(),
            auth: AuthMethod::Interactive,
        }
    }

    fn certificate_spec() -> SessionSpec {
        SessionSpec {
            tenant_id: "contoso".to_string(),
            username: "admin@contoso.com".to_string(),
            auth: AuthMethod::Certificate {
                thumbprint: "AABBCC".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn interactive_connect_walks_through_mfa() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(interactive_spec());
        assert_eq!(reg.state(&id), Some(SessionState::Connecting));

        reg.inject_output(&id, "Enter the verification code sent to your device\n");
        assert_eq!(reg.state(&id), Some(SessionState::AwaitingMfa));

        reg.inject_output(&id, "LINECTL_READY\n");
        assert_eq!(reg.state(&id), Some(SessionState::Connected));
    }

    #[tokio::test]
    async fn certificate_session_never_awaits_mfa() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());

        reg.inject_output(&id, "Enter the verification code\n");
        assert_eq!(reg.state(&id), Some(SessionState::Connecting));

        reg.inject_output(&id, "Connected to contoso admin endpoint\n");
        assert_eq!(reg.state(&id), Some(SessionState::Connected));
    }

    #[tokio::test]
    async fn partial_lines_are_assembled_across_chunks() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());

        reg.inject_output(&id, "LINECTL_");
        assert_eq!(reg.state(&id), Some(SessionState::Connecting));
        reg.inject_output(&id, "READY\nextra\n");
        assert_eq!(reg.state(&id), Some(SessionState::Connected));

        let lines = reg.output_snapshot(&id).unwrap();
        assert_eq!(lines, vec!["LINECTL_READY".to_string(), "extra".to_string()]);
    }

    #[tokio::test]
    async fn fatal_stderr_line_fails_the_session_for_good() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(interactive_spec());

        reg.inject_stderr(&id, "Connect-LineAdmin : Authentication failed for admin@contoso.com\n");
        assert_eq!(reg.state(&id), Some(SessionState::Error));

        // Error is terminal; a late ready banner must not revive the session.
        reg.inject_output(&id, "LINECTL_READY\n");
        assert_eq!(reg.state(&id), Some(SessionState::Error));
        assert!(!reg.send_command(&id, "Get-Numbers"));
    }

    #[tokio::test]
    async fn stderr_diagnostics_land_in_session_output() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        let mut events = reg.subscribe(&id).unwrap();

        reg.inject_stderr(&id, "WARNING: module load took 4s\n");

        assert_eq!(reg.state(&id), Some(SessionState::Connecting));
        let lines = reg.output_snapshot(&id).unwrap();
        assert_eq!(lines, vec!["WARNING: module load took 4s".to_string()]);
        match events.recv().await.unwrap() {
            SessionEvent::Output(line) => assert_eq!(line, "WARNING: module load took 4s"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_command_reaches_stdin_and_respects_terminal_state() {
        let reg = registry();
        let (id, mut stdin) = reg.create_detached_session(certificate_spec());

        assert!(reg.send_command(&id, "Get-Numbers"));
        assert_eq!(stdin.recv().await.unwrap(), "Get-Numbers");

        reg.close_session(&id).await;
        assert!(!reg.send_command(&id, "Get-Numbers"));
    }

    #[tokio::test]
    async fn send_command_to_unknown_session_is_false() {
        let reg = registry();
        assert!(!reg.send_command(&SessionId::new(), "anything"));
    }

    #[tokio::test]
    async fn closed_session_id_never_returns() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        reg.inject_output(&id, "LINECTL_READY\n");
        assert_eq!(reg.state(&id), Some(SessionState::Connected));

        reg.close_session(&id).await;
        assert_eq!(reg.state(&id), None);

        // Late output from the dying shell must not resurrect the id.
        reg.inject_output(&id, "LINECTL_READY\n");
        assert_eq!(reg.state(&id), None);
        assert!(reg.list().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        reg.close_session(&id).await;
        reg.close_session(&id).await;
    }

    #[tokio::test]
    async fn idle_sweep_reaps_only_stale_sessions() {
        let mut config = Config::default();
        config.idle_timeout = std::time::Duration::from_millis(50);
        let reg = SessionRegistry::new(config);

        let (stale, _a) = reg.create_detached_session(certificate_spec());
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        let (fresh, _b) = reg.create_detached_session(certificate_spec());

        assert_eq!(reg.sweep_idle().await, 1);
        assert_eq!(reg.state(&stale), None);
        assert!(reg.state(&fresh).is_some());
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        let mut events = reg.subscribe(&id).unwrap();

        reg.inject_output(&id, "first\nLINECTL_READY\n");

        match events.recv().await.unwrap() {
            SessionEvent::Output(line) => assert_eq!(line, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().await.unwrap() {
            SessionEvent::Output(line) => assert_eq!(line, "LINECTL_READY"),
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().await.unwrap() {
            SessionEvent::StateChanged(state) => assert_eq!(state, SessionState::Connected),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_query_returns_framed_payload() {
        let mut config = Config::default();
        config.completion_timeout = std::time::Duration::from_millis(300);
        config.completion_poll = std::time::Duration::from_millis(20);
        let reg = std::sync::Arc::new(SessionRegistry::new(config));

        let (id, mut stdin) = reg.create_detached_session(certificate_spec());
        reg.inject_output(&id, "LINECTL_READY\n");

        // Answer the query script with a framed payload under its own token.
        let responder_reg = reg.clone();
        let responder_id = id.clone();
        tokio::spawn(async move {
            let script = stdin.recv().await.unwrap();
            let needle = "LINECTL_JSON_BEGIN_";
            let start = script.find(needle).unwrap() + needle.len();
            let tok: String = script[start..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            responder_reg.inject_output(
                &responder_id,
                &format!(
                    "LINECTL_JSON_BEGIN_{tok}\n[{{\"lineUri\":\"+15551230000\"}}]\nLINECTL_JSON_END_{tok}\n"
                ),
            );
        });

        let value = reg.run_query(&id, "Get-Numbers | ConvertTo-Json").await.unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["lineUri"], "+15551230000");
    }

    #[tokio::test]
    async fn run_query_times_out_against_a_silent_session() {
        let mut config = Config::default();
        config.completion_timeout = std::time::Duration::from_millis(150);
        config.completion_poll = std::time::Duration::from_millis(20);
        let reg = SessionRegistry::new(config);

        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        let err = reg
            .run_query(&id, "Get-Numbers | ConvertTo-Json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompletionTimeout { .. }));
    }

    #[tokio::test]
    async fn run_query_on_closed_session_fails_without_hanging() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());
        reg.close_session(&id).await;
        let err = reg.run_query(&id, "Get-Numbers").await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
    }

    #[tokio::test]
    async fn command_lock_serializes_holders() {
        let reg = registry();
        let (id, _stdin) = reg.create_detached_session(certificate_spec());

        let guard = reg.lock_commands(&id).await.unwrap();
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            reg.lock_commands(&id),
        )
        .await;
        assert!(second.is_err(), "second holder acquired while first held");
        drop(guard);
        assert!(reg.lock_commands(&id).await.is_some());
    }
}

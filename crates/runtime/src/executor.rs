//! One-shot script execution.
//!
//! Runs a single script to completion in a fresh admin shell process and
//! never reuses that process. Used for idempotent queries and connectivity
//! tests; anything stateful goes through a session instead.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::{environment_supported, locate_admin_shell};
use crate::process::KILL_GRACE;

/// Credential pair passed to the script via the process environment.
///
/// Never interpolated into the script text and never written to disk, so the
/// temp file and process listing stay free of secrets.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

/// Result of one script run.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Classified failure cause (timeout, spawn failure, unsupported
    /// environment); `None` on success.
    pub error: Option<String>,
}

impl ExecOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(message.into()),
        }
    }
}

/// Stateless executor for one-shot scripts.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    shell: Option<PathBuf>,
    base_args: Vec<String>,
    timeout: Duration,
}

impl ScriptExecutor {
    /// Executor using the located admin shell in non-interactive file mode.
    pub fn new(timeout: Duration) -> Self {
        Self {
            shell: None,
            base_args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-File".to_string(),
            ],
            timeout,
        }
    }

    /// Executor pinned to an explicit shell binary and argument prefix; the
    /// script path is appended. Used by tests and by callers that manage
    /// their own shell discovery.
    pub fn with_shell(shell: PathBuf, base_args: &[&str], timeout: Duration) -> Self {
        Self {
            shell: Some(shell),
            base_args: base_args.iter().map(|s| s.to_string()).collect(),
            timeout,
        }
    }

    /// Runs `script` to completion.
    ///
    /// The script is written to a freshly created process-unique temporary
    /// directory which is removed on every exit path. Credentials, when
    /// supplied, travel only through the environment. The run resolves
    /// within the configured timeout: at the deadline the process gets a
    /// graceful stop request, then a forceful kill after the grace period,
    /// and the outcome reports `success=false` with an explicit timed-out
    /// error alongside whatever output was collected.
    pub async fn run(&self, script: &str, credentials: Option<&Credentials>) -> Result<ExecOutcome> {
        if let Err(e) = environment_supported() {
            debug!(target = "linectl", error = %e, "executor short-circuit");
            return Ok(ExecOutcome::failure(e.to_string()));
        }

        let shell = match &self.shell {
            Some(path) => path.clone(),
            None => match locate_admin_shell() {
                Ok(path) => path,
                Err(e) => return Ok(ExecOutcome::failure(e.to_string())),
            },
        };

        // RAII temp scope: deleted on drop regardless of how this fn exits.
        let dir = tempfile::tempdir().map_err(Error::Io)?;
        let script_path = dir.path().join("linectl-exec.ps1");
        tokio::fs::write(&script_path, script).await.map_err(Error::Io)?;

        let mut cmd = Command::new(&shell);
        cmd.args(&self.base_args)
            .arg(&script_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        if let Some(creds) = credentials {
            cmd.env("LINECTL_USERNAME", &creds.username);
            cmd.env("LINECTL_SECRET", &creds.secret);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(ExecOutcome::failure(format!(
                    "failed to spawn admin shell: {e}"
                )));
            }
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stdout_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let timed_out = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                return Ok(ExecOutcome {
                    success: status.success(),
                    stdout,
                    stderr,
                    exit_code: status.code(),
                    error: if status.success() {
                        None
                    } else {
                        Some(format!("script exited with status {status}"))
                    },
                });
            }
            Ok(Err(e)) => {
                warn!(target = "linectl", error = %e, "wait on script process failed");
                false
            }
            Err(_) => true,
        };

        // Deadline passed (or wait failed): graceful stop, grace period, kill.
        request_graceful_stop(&mut child);
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let error = if timed_out {
            Error::ExecTimeout {
                timeout_secs: self.timeout.as_secs(),
            }
            .to_string()
        } else {
            "script process could not be awaited".to_string()
        };

        Ok(ExecOutcome {
            success: false,
            stdout,
            stderr,
            exit_code: None,
            error: Some(error),
        })
    }
}

/// Asks the script process to stop. A script launched in file mode never
/// reads stdin, so closing it is not a stop request; on unix the graceful
/// phase is SIGTERM, giving well-behaved scripts the grace period to flush.
#[cfg(unix)]
fn request_graceful_stop(child: &mut tokio::process::Child) {
    drop(child.stdin.take());
    if let Some(pid) = child.id() {
        unsafe {
            let _ = libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_graceful_stop(child: &mut tokio::process::Child) {
    drop(child.stdin.take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn sh_executor(timeout: Duration) -> ScriptExecutor {
        ScriptExecutor::with_shell(PathBuf::from("/bin/sh"), &[], timeout)
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn captures_stdout_stderr_and_exit_code() {
        let exec = sh_executor(Duration::from_secs(10));
        let outcome = exec
            .run("echo out-line\necho err-line >&2\nexit 0\n", None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.stdout.trim(), "out-line");
        assert_eq!(outcome.stderr.trim(), "err-line");
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn nonzero_exit_is_a_failure_with_output_kept() {
        let exec = sh_executor(Duration::from_secs(10));
        let outcome = exec.run("echo partial\nexit 7\n", None).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(7));
        assert_eq!(outcome.stdout.trim(), "partial");
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn timeout_kills_the_process_and_reports_timed_out() {
        let exec = sh_executor(Duration::from_millis(300));
        let start = Instant::now();
        let outcome = exec.run("echo before\nsleep 60\n", None).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap_or("").contains("timed out"));
        // Partial output collected before the deadline is retained.
        assert_eq!(outcome.stdout.trim(), "before");
        // Deadline + grace period, with margin; never the full sleep.
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn graceful_stop_lets_a_trapping_script_flush() {
        let exec = sh_executor(Duration::from_millis(300));
        let start = Instant::now();
        // The trap only runs once `wait` is interrupted, and the sleeping
        // child must not inherit our stdout pipe or reading it would block
        // until the sleep ends.
        let script = "trap 'echo cleaned-up; exit 0' TERM\n\
                      echo running\n\
                      sleep 60 > /dev/null 2>&1 &\n\
                      wait $!\n";
        let outcome = exec.run(script, None).await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap_or("").contains("timed out"));
        assert!(outcome.stdout.contains("running"));
        // The termination request reached the script in time to flush.
        assert!(outcome.stdout.contains("cleaned-up"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn credentials_travel_via_environment_only() {
        let exec = sh_executor(Duration::from_secs(10));
        let creds = Credentials {
            username: "ops@example.com".to_string(),
            secret: "hunter2".to_string(),
        };
        let outcome = exec
            .run("echo \"user=$LINECTL_USERNAME\"\n", Some(&creds))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.stdout.trim(), "user=ops@example.com");
    }

    #[tokio::test]
    async fn unsupported_environment_short_circuits_fast() {
        // SAFETY: this is the only test in the binary touching the variable.
        unsafe { std::env::set_var("LINECTL_FORCE_UNSUPPORTED", "1") };
        let exec = sh_executor(Duration::from_secs(30));
        let start = Instant::now();
        let outcome = exec.run("echo never\n", None).await.unwrap();
        unsafe { std::env::remove_var("LINECTL_FORCE_UNSUPPORTED") };

        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap_or("")
            .contains("unsupported environment"));
        assert!(outcome.stdout.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn missing_shell_is_a_spawn_failure_not_a_hang() {
        let exec = ScriptExecutor::with_shell(
            PathBuf::from("/nonexistent/linectl-shell"),
            &[],
            Duration::from_secs(30),
        );
        let start = Instant::now();
        let outcome = exec.run("echo never\n", None).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap_or("").contains("spawn"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

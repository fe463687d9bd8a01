//! Admin shell process management
//!
//! Handles launching the interactive admin shell and tearing it down with a
//! graceful-then-forceful escalation. One [`HostProcess`] backs exactly one
//! session; the child handle is never shared.

use std::path::Path;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// How long a graceful exit request gets before the process is killed.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Manages one admin shell child process.
#[derive(Debug)]
pub struct HostProcess {
    process: Child,
}

impl HostProcess {
    /// Launch the admin shell in interactive command mode.
    ///
    /// Stdin/stdout/stderr are piped; `envs` carries anything that must not
    /// appear on the command line or in a script file (credentials).
    ///
    /// # Errors
    ///
    /// Returns [`Error::LaunchFailed`] if the process fails to start or
    /// exits immediately.
    pub async fn launch(
        shell: &Path,
        args: &[&str],
        envs: &[(String, String)],
    ) -> Result<Self> {
        let mut cmd = Command::new(shell);
        cmd.args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        for (key, value) in envs {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::LaunchFailed(format!("failed to spawn process: {e}")))?;

        // Catch binaries that die on startup before handing the pipes out.
        tokio::time::sleep(Duration::from_millis(100)).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(Error::LaunchFailed(format!(
                    "admin shell exited immediately with status: {status}"
                )));
            }
            Ok(None) => {}
            Err(e) => {
                return Err(Error::LaunchFailed(format!(
                    "failed to check process status: {e}"
                )));
            }
        }

        Ok(Self { process: child })
    }

    /// Process id of the child, when still known.
    pub fn id(&self) -> Option<u32> {
        self.process.id()
    }

    /// Takes the stdio pipe handles for the transport. Each handle can be
    /// taken once.
    pub fn take_stdio(
        &mut self,
    ) -> (
        Option<tokio::process::ChildStdin>,
        Option<tokio::process::ChildStdout>,
        Option<tokio::process::ChildStderr>,
    ) {
        (
            self.process.stdin.take(),
            self.process.stdout.take(),
            self.process.stderr.take(),
        )
    }

    /// Returns `Ok(Some(_))` when the child has already exited.
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.process.try_wait().map_err(Error::Io)
    }

    /// Waits for the child to exit.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.process.wait().await.map_err(Error::Io)
    }

    /// Shut down gracefully: close stdin so the shell sees EOF and exits,
    /// then kill if it has not exited within [`KILL_GRACE`].
    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.process.stdin.take());

        match tokio::time::timeout(KILL_GRACE, self.process.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::LaunchFailed(format!(
                "failed to wait for process: {e}"
            ))),
            Err(_) => {
                self.process
                    .kill()
                    .await
                    .map_err(|e| Error::LaunchFailed(format!("failed to kill process: {e}")))?;
                let _ = self.process.wait().await;
                Ok(())
            }
        }
    }

    /// Force kill without a graceful phase.
    pub async fn kill(mut self) -> Result<()> {
        drop(self.process.stdin.take());
        self.process
            .kill()
            .await
            .map_err(|e| Error::LaunchFailed(format!("failed to kill process: {e}")))?;
        let _ = tokio::time::timeout(Duration::from_millis(500), self.process.wait()).await;
        Ok(())
    }
}

//! Admin shell location and environment checks.
//!
//! Resolution order mirrors the other override-then-fallback lookups in this
//! codebase: explicit environment variable first, then PATH, then common
//! install locations. Every candidate is probed before it wins so a stale
//! override never sends callers into a spawn that hangs.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::warn;

use crate::error::{Error, Result};

/// Shell binaries accepted from PATH, in preference order.
const SHELL_NAMES: &[&str] = &["pwsh", "powershell"];

/// Locate the admin shell executable.
///
/// Attempts, in order:
/// 1. `LINECTL_SHELL_EXE` environment variable (runtime override)
/// 2. `pwsh` / `powershell` on PATH
/// 3. Common install locations
///
/// # Errors
///
/// Returns [`Error::HostNotFound`] if no runnable shell is found.
pub fn locate_admin_shell() -> Result<PathBuf> {
    if let Ok(exe) = std::env::var("LINECTL_SHELL_EXE") {
        let path = PathBuf::from(exe);
        if path.exists() && shell_is_usable(&path) {
            return Ok(path);
        }
        warn!(
            target = "linectl",
            path = %path.display(),
            "LINECTL_SHELL_EXE is set but not runnable; falling back"
        );
    }

    for name in SHELL_NAMES {
        if let Ok(path) = which::which(name) {
            if shell_is_usable(&path) {
                return Ok(path);
            }
        }
    }

    #[cfg(not(windows))]
    let common_locations = [
        "/usr/local/bin/pwsh",
        "/usr/bin/pwsh",
        "/opt/microsoft/powershell/7/pwsh",
        "/opt/homebrew/bin/pwsh",
    ];

    #[cfg(windows)]
    let common_locations = [
        "C:\\Program Files\\PowerShell\\7\\pwsh.exe",
        "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe",
    ];

    for location in &common_locations {
        let path = PathBuf::from(location);
        if path.exists() && shell_is_usable(&path) {
            return Ok(path);
        }
    }

    Err(Error::HostNotFound)
}

/// Checks whether this environment can structurally support the admin shell.
///
/// Some sandboxes (no controlling terminal) would make a spawn hang until
/// its timeout rather than fail; callers short-circuit on `Err` here with an
/// immediate, actionable message instead of attempting the spawn. Shell
/// discovery is a separate concern; see [`locate_admin_shell`].
pub fn environment_supported() -> Result<()> {
    // Test hook so the guard path is exercisable anywhere.
    if std::env::var("LINECTL_FORCE_UNSUPPORTED").is_ok() {
        return Err(Error::UnsupportedEnvironment(
            "LINECTL_FORCE_UNSUPPORTED is set".to_string(),
        ));
    }

    #[cfg(unix)]
    {
        // The hosted-platform module refuses to load without a device tty.
        if !Path::new("/dev/tty").exists() {
            return Err(Error::UnsupportedEnvironment(
                "no controlling terminal available (/dev/tty missing); interactive admin sessions cannot run here"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn shell_is_usable(shell: &Path) -> bool {
    Command::new(shell)
        .args(["-NoProfile", "-Command", "$PSVersionTable.PSVersion.Major"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_admin_shell_finds_or_errors() {
        match locate_admin_shell() {
            Ok(path) => assert!(path.exists()),
            Err(Error::HostNotFound) => {
                // Expected on hosts without PowerShell installed.
            }
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn unsupported_error_is_pre_spawn() {
        let err = Error::UnsupportedEnvironment("x".into());
        assert!(err.is_pre_spawn());
        assert!(Error::HostNotFound.is_pre_spawn());
        assert!(!Error::ChannelClosed.is_pre_spawn());
    }
}

use std::path::Path;
use std::time::Duration;

use line_runtime::{Credentials, ScriptExecutor};
use linecore::Config;

use crate::error::{CliError, Result};

/// Runs a script file through a fresh, stateless shell process. Suitable for
/// idempotent queries and connectivity tests; mutations go through sessions.
pub async fn run(config: &Config, script: &Path, timeout_secs: Option<u64>) -> Result<()> {
	let text = std::fs::read_to_string(script)?;
	let timeout = timeout_secs
		.map(Duration::from_secs)
		.unwrap_or(config.exec_timeout);

	let executor = ScriptExecutor::new(timeout);
	let outcome = executor.run(&text, credentials_from_env().as_ref()).await?;

	if !outcome.stdout.is_empty() {
		print!("{}", outcome.stdout);
	}
	if !outcome.stderr.is_empty() {
		eprint!("{}", outcome.stderr);
	}

	if outcome.success {
		Ok(())
	} else {
		Err(CliError::Exec(
			outcome
				.error
				.unwrap_or_else(|| "script failed with no diagnostic".to_string()),
		))
	}
}

/// Credentials travel via the environment only; they never land on the
/// command line or in the script file.
fn credentials_from_env() -> Option<Credentials> {
	let username = std::env::var("LINECTL_USERNAME").ok()?;
	let secret = std::env::var("LINECTL_SECRET").ok()?;
	Some(Credentials { username, secret })
}

use colored::Colorize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("script execution failed: {0}")]
	Exec(String),

	#[error("environment check failed")]
	DoctorFailed,

	#[error(transparent)]
	Core(#[from] linecore::Error),

	#[error(transparent)]
	Runtime(#[from] line_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Human-readable message printed to stderr before a nonzero exit.
	pub fn exit_message(&self) -> String {
		let mut msg = format!("{} {self}", "error:".red().bold());
		if let Some(hint) = self.hint() {
			msg.push_str(&format!("\n{} {hint}", "hint:".cyan().bold()));
		}
		msg
	}

	fn hint(&self) -> Option<&'static str> {
		match self {
			CliError::Core(e) if e.is_timeout() => {
				Some("the admin shell did not respond in time; the session was discarded and no inventory change was recorded")
			}
			CliError::Core(linecore::Error::Runtime(r)) | CliError::Runtime(r) if r.is_pre_spawn() => {
				Some("run `linectl doctor` to check shell availability in this environment")
			}
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_errors_carry_a_hint() {
		let err = CliError::Core(linecore::Error::CompletionTimeout {
			token: "t".to_string(),
			timeout_secs: 60,
		});
		assert!(err.exit_message().contains("hint:"));
	}

	#[test]
	fn pre_spawn_errors_point_at_doctor() {
		let err = CliError::Runtime(line_runtime::Error::HostNotFound);
		assert!(err.exit_message().contains("doctor"));
	}
}

use colored::Colorize;

use line_runtime::{environment_supported, locate_admin_shell};
use linecore::Config;

use crate::error::{CliError, Result};

/// Reports whether this environment can run interactive admin sessions.
pub fn run(config: &Config) -> Result<()> {
	let mut healthy = true;

	match environment_supported() {
		Ok(()) => println!("{} environment supports interactive sessions", "ok".green().bold()),
		Err(e) => {
			healthy = false;
			println!("{} {e}", "fail".red().bold());
		}
	}

	match locate_admin_shell() {
		Ok(path) => println!("{} admin shell at {}", "ok".green().bold(), path.display()),
		Err(e) => {
			healthy = false;
			println!("{} {e}", "fail".red().bold());
		}
	}

	println!();
	println!("exec timeout:        {}s", config.exec_timeout.as_secs());
	println!("connect timeout:     {}s", config.connect_timeout.as_secs());
	println!("completion timeout:  {}s", config.completion_timeout.as_secs());
	println!("idle timeout:        {}s", config.idle_timeout.as_secs());
	println!("aging period:        {}s", config.aging_period.as_secs());

	if healthy { Ok(()) } else { Err(CliError::DoctorFailed) }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "linectl")]
#[command(about = "Tenant phone-number provisioning over the platform admin shell")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Inventory state file (default: $LINECTL_STATE_FILE, then ./linectl-state.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub state: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Assign a number (and optional voice routing policy) to a user
	Assign {
		#[arg(long)]
		tenant: String,
		/// Admin account the session signs in as
		#[arg(long)]
		operator: String,
		/// Certificate thumbprint for non-interactive sign-in
		#[arg(long, value_name = "THUMBPRINT")]
		certificate: Option<String>,
		/// Target user principal name
		#[arg(long)]
		user: String,
		/// Display name recorded on the assignment (defaults to the principal)
		#[arg(long)]
		display_name: Option<String>,
		#[arg(long, value_name = "E164")]
		line: String,
		/// Voice routing policy granted alongside the line
		#[arg(long)]
		policy: Option<String>,
	},

	/// Reserve an available number ahead of an assignment
	Reserve {
		#[arg(long)]
		tenant: String,
		#[arg(long, value_name = "E164")]
		line: String,
		/// Who holds the reservation
		#[arg(long)]
		by: String,
	},

	/// Release a reservation; the number ages before reuse
	Release {
		#[arg(long)]
		tenant: String,
		#[arg(long, value_name = "E164")]
		line: String,
		#[arg(long, default_value = "linectl")]
		by: String,
	},

	/// Remove a user's assignment; the number ages before reuse
	Remove {
		#[arg(long)]
		tenant: String,
		#[arg(long, value_name = "E164")]
		line: String,
		#[arg(long, default_value = "linectl")]
		by: String,
	},

	/// Delete a number from the inventory entirely
	Delete {
		#[arg(long)]
		tenant: String,
		#[arg(long, value_name = "E164")]
		line: String,
	},

	/// Inspect or seed the number inventory
	Numbers {
		#[command(subcommand)]
		action: NumbersAction,
	},

	/// Inspect or close live sessions
	Sessions {
		#[command(subcommand)]
		action: SessionsAction,
	},

	/// Run the lifecycle sweep now
	Sweep,

	/// Run a one-shot script through the admin shell
	Exec {
		/// Script file to run
		#[arg(long, value_name = "FILE")]
		script: PathBuf,
		/// Override the execution timeout
		#[arg(long, value_name = "SECS")]
		timeout_secs: Option<u64>,
	},

	/// Check whether this environment can run the admin shell
	Doctor,
}

#[derive(Subcommand, Debug)]
pub enum NumbersAction {
	/// List a tenant's numbers
	List {
		#[arg(long)]
		tenant: String,
	},
	/// Seed numbers into the inventory as available
	Import {
		#[arg(long)]
		tenant: String,
		#[arg(long, default_value = "linectl")]
		by: String,
		/// Numbers in E.164 form
		#[arg(required = true, value_name = "E164")]
		lines: Vec<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
	/// List sessions opened by this process
	List,
	/// Close a session by id
	Close {
		id: String,
	},
}

use colored::Colorize;

use linecore::{AssignmentRequest, AuthMethod, LifecycleEngine, SessionRegistry, assign_number};

use crate::error::Result;

pub struct Args {
	pub tenant: String,
	pub operator: String,
	pub certificate: Option<String>,
	pub user: String,
	pub display_name: Option<String>,
	pub line: String,
	pub policy: Option<String>,
}

pub async fn run(registry: &SessionRegistry, engine: &LifecycleEngine, args: Args) -> Result<()> {
	let auth = match args.certificate {
		Some(thumbprint) => AuthMethod::Certificate { thumbprint },
		None => AuthMethod::Interactive,
	};

	let request = AssignmentRequest {
		tenant_id: args.tenant,
		operator: args.operator,
		auth,
		user_principal: args.user.clone(),
		user_display_name: args.display_name.unwrap_or_else(|| args.user.clone()),
		line_uri: args.line,
		routing_policy: args.policy,
	};

	let outcome = assign_number(registry, engine, request).await?;

	println!(
		"{} {} -> {}",
		"assigned".green().bold(),
		outcome.record.line_uri,
		args.user
	);
	if let Some(policy) = &outcome.record.routing_policy {
		println!("policy: {policy}");
	}
	if let Some(previous) = &outcome.previous_line {
		if *previous != outcome.record.line_uri {
			println!("released {previous} back to the pool");
		}
	}
	Ok(())
}

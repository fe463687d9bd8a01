mod assign;
mod doctor;
mod exec;
mod lifecycle;
mod numbers;
mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use linecore::{Config, LifecycleEngine, SessionRegistry};

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::store::JsonStore;

fn state_path(explicit: Option<PathBuf>) -> PathBuf {
	explicit
		.or_else(|| std::env::var_os("LINECTL_STATE_FILE").map(PathBuf::from))
		.unwrap_or_else(|| PathBuf::from("linectl-state.json"))
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = Config::from_env();

	// Doctor and exec never touch the inventory.
	match &cli.command {
		Commands::Doctor => return doctor::run(&config),
		Commands::Exec { script, timeout_secs } => {
			return exec::run(&config, script, *timeout_secs).await;
		}
		_ => {}
	}

	let store = Arc::new(JsonStore::open(state_path(cli.state.clone()))?);
	let engine = LifecycleEngine::new(store, &config);

	match cli.command {
		Commands::Assign {
			tenant,
			operator,
			certificate,
			user,
			display_name,
			line,
			policy,
		} => {
			let registry = SessionRegistry::new(config.clone());
			assign::run(
				&registry,
				&engine,
				assign::Args {
					tenant,
					operator,
					certificate,
					user,
					display_name,
					line,
					policy,
				},
			)
			.await
		}
		Commands::Reserve { tenant, line, by } => {
			lifecycle::reserve(&engine, &tenant, &line, &by).await
		}
		Commands::Release { tenant, line, by } => {
			lifecycle::release(&engine, &tenant, &line, &by).await
		}
		Commands::Remove { tenant, line, by } => {
			lifecycle::remove(&engine, &tenant, &line, &by).await
		}
		Commands::Delete { tenant, line } => lifecycle::delete(&engine, &tenant, &line).await,
		Commands::Sweep => lifecycle::sweep(&engine).await,
		Commands::Numbers { action } => numbers::run(&engine, action).await,
		Commands::Sessions { action } => {
			let registry = SessionRegistry::new(config.clone());
			sessions::run(&registry, action).await
		}
		Commands::Doctor | Commands::Exec { .. } => unreachable!("handled above"),
	}
}

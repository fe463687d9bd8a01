use colored::{ColoredString, Colorize};

use linecore::{LifecycleEngine, NumberStatus, PhoneNumber};

use crate::cli::NumbersAction;
use crate::error::Result;

pub async fn run(engine: &LifecycleEngine, action: NumbersAction) -> Result<()> {
	match action {
		NumbersAction::List { tenant } => list(engine, &tenant).await,
		NumbersAction::Import { tenant, by, lines } => import(engine, &tenant, &by, &lines).await,
	}
}

async fn list(engine: &LifecycleEngine, tenant: &str) -> Result<()> {
	let rows = engine.store().list(tenant).await?;
	if rows.is_empty() {
		println!("no numbers for tenant {tenant}");
		return Ok(());
	}

	println!("{:<18} {:<10} {}", "LINE", "STATUS", "DETAIL");
	for rec in &rows {
		println!("{:<18} {:<10} {}", rec.line_uri, paint(rec.status), detail(rec));
	}
	Ok(())
}

async fn import(engine: &LifecycleEngine, tenant: &str, by: &str, lines: &[String]) -> Result<()> {
	let mut imported = 0usize;
	for line in lines {
		match engine.import(tenant, line, by).await {
			Ok(rec) => {
				println!("{} {}", "imported".green(), rec.line_uri);
				imported += 1;
			}
			Err(linecore::Error::DuplicateLine { line, .. }) => {
				println!("{} {line} already present", "skipped".yellow());
			}
			Err(e) => return Err(e.into()),
		}
	}
	println!("{imported} of {} imported", lines.len());
	Ok(())
}

fn paint(status: NumberStatus) -> ColoredString {
	match status {
		NumberStatus::Available => "available".green(),
		NumberStatus::Reserved => "reserved".cyan(),
		NumberStatus::Used => "used".yellow(),
		NumberStatus::Aging => "aging".magenta(),
	}
}

fn detail(rec: &PhoneNumber) -> String {
	match rec.status {
		NumberStatus::Used => rec.assignee_principal.clone().unwrap_or_default(),
		NumberStatus::Reserved => rec
			.reserved_by
			.clone()
			.map(|by| format!("held by {by}"))
			.unwrap_or_default(),
		NumberStatus::Aging => rec
			.aging_until
			.map(|t| format!("until {}", t.to_rfc3339()))
			.unwrap_or_default(),
		NumberStatus::Available => String::new(),
	}
}

use colored::Colorize;

use linecore::LifecycleEngine;

use crate::error::Result;

pub async fn reserve(engine: &LifecycleEngine, tenant: &str, line: &str, by: &str) -> Result<()> {
	let rec = engine.reserve(tenant, line, by).await?;
	println!("{} {} for {}", "reserved".cyan().bold(), rec.line_uri, by);
	Ok(())
}

pub async fn release(engine: &LifecycleEngine, tenant: &str, line: &str, by: &str) -> Result<()> {
	let rec = engine.release_reservation(tenant, line, by).await?;
	let until = rec
		.aging_until
		.map(|t| t.to_rfc3339())
		.unwrap_or_default();
	println!("{} {}; available again after {}", "released".green().bold(), rec.line_uri, until);
	Ok(())
}

pub async fn remove(engine: &LifecycleEngine, tenant: &str, line: &str, by: &str) -> Result<()> {
	let rec = engine.remove_assignment(tenant, line, by).await?;
	let until = rec
		.aging_until
		.map(|t| t.to_rfc3339())
		.unwrap_or_default();
	println!("{} assignment on {}; available again after {}", "removed".yellow().bold(), rec.line_uri, until);
	Ok(())
}

pub async fn delete(engine: &LifecycleEngine, tenant: &str, line: &str) -> Result<()> {
	engine.delete(tenant, line).await?;
	println!("{} {line} from the inventory", "deleted".red().bold());
	Ok(())
}

pub async fn sweep(engine: &LifecycleEngine) -> Result<()> {
	let flipped = engine.sweep().await?;
	println!("sweep complete; {flipped} number(s) returned to available");
	Ok(())
}

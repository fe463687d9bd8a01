use linecore::{SessionId, SessionRegistry};

use crate::cli::SessionsAction;
use crate::error::Result;

pub async fn run(registry: &SessionRegistry, action: SessionsAction) -> Result<()> {
	match action {
		SessionsAction::List => {
			let sessions = registry.list();
			if sessions.is_empty() {
				println!("no live sessions in this process");
				return Ok(());
			}
			println!("{:<24} {:<16} {:<28} {:<14} LAST ACTIVITY", "ID", "TENANT", "USER", "STATE");
			for info in sessions {
				println!(
					"{:<24} {:<16} {:<28} {:<14} {}",
					info.id.to_string(),
					info.tenant_id,
					info.username,
					info.state.to_string(),
					info.last_activity.to_rfc3339(),
				);
			}
			Ok(())
		}
		SessionsAction::Close { id } => {
			let id = SessionId::from_raw(id);
			if registry.state(&id).is_none() {
				println!("session {id} not found (already closed?)");
				return Ok(());
			}
			registry.close_session(&id).await;
			println!("session {id} closed");
			Ok(())
		}
	}
}

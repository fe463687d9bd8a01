//! File-backed inventory store.
//!
//! The CLI is a one-shot process, so the inventory lives in a JSON state
//! file between invocations. Loaded once at startup; every mutation rewrites
//! the file through a temp-then-rename so a crash mid-write never leaves a
//! torn state file behind.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use linecore::{InventoryStore, NumberStatus, PhoneNumber};

pub struct JsonStore {
	path: PathBuf,
	records: RwLock<HashMap<Uuid, PhoneNumber>>,
}

impl JsonStore {
	/// Opens the store at `path`. A missing file is an empty inventory.
	pub fn open(path: PathBuf) -> crate::error::Result<Self> {
		let records = match std::fs::read(&path) {
			Ok(bytes) => {
				let rows: Vec<PhoneNumber> = serde_json::from_slice(&bytes)?;
				rows.into_iter().map(|r| (r.id, r)).collect()
			}
			Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
			Err(e) => return Err(e.into()),
		};
		Ok(Self {
			path,
			records: RwLock::new(records),
		})
	}

	fn persist(&self) -> linecore::Result<()> {
		let mut rows: Vec<PhoneNumber> = self.records.read().values().cloned().collect();
		rows.sort_by(|a, b| (&a.tenant_id, &a.line_uri).cmp(&(&b.tenant_id, &b.line_uri)));
		let json = serde_json::to_vec_pretty(&rows)?;

		let tmp = self.path.with_extension("json.tmp");
		std::fs::write(&tmp, &json)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}
}

#[async_trait]
impl InventoryStore for JsonStore {
	async fn get(&self, id: Uuid) -> linecore::Result<Option<PhoneNumber>> {
		Ok(self.records.read().get(&id).cloned())
	}

	async fn get_by_line(&self, tenant: &str, line_uri: &str) -> linecore::Result<Option<PhoneNumber>> {
		Ok(self
			.records
			.read()
			.values()
			.find(|r| r.tenant_id == tenant && r.line_uri == line_uri)
			.cloned())
	}

	async fn get_by_assignee(&self, tenant: &str, principal: &str) -> linecore::Result<Option<PhoneNumber>> {
		Ok(self
			.records
			.read()
			.values()
			.find(|r| {
				r.tenant_id == tenant
					&& r.status == NumberStatus::Used
					&& r.assignee_principal.as_deref() == Some(principal)
			})
			.cloned())
	}

	async fn list(&self, tenant: &str) -> linecore::Result<Vec<PhoneNumber>> {
		let mut rows: Vec<PhoneNumber> = self
			.records
			.read()
			.values()
			.filter(|r| r.tenant_id == tenant)
			.cloned()
			.collect();
		rows.sort_by(|a, b| a.line_uri.cmp(&b.line_uri));
		Ok(rows)
	}

	async fn insert(&self, record: PhoneNumber) -> linecore::Result<()> {
		{
			let mut records = self.records.write();
			if records
				.values()
				.any(|r| r.tenant_id == record.tenant_id && r.line_uri == record.line_uri)
			{
				return Err(linecore::Error::DuplicateLine {
					tenant: record.tenant_id.clone(),
					line: record.line_uri.clone(),
				});
			}
			records.insert(record.id, record);
		}
		self.persist()
	}

	async fn update(&self, record: &PhoneNumber) -> linecore::Result<()> {
		{
			let mut records = self.records.write();
			match records.get_mut(&record.id) {
				Some(existing) => *existing = record.clone(),
				None => {
					return Err(linecore::Error::NotFound(format!(
						"inventory record {}",
						record.id
					)));
				}
			}
		}
		self.persist()
	}

	async fn delete(&self, id: Uuid) -> linecore::Result<bool> {
		let removed = self.records.write().remove(&id).is_some();
		if removed {
			self.persist()?;
		}
		Ok(removed)
	}

	async fn list_aging_expired(&self, now: DateTime<Utc>) -> linecore::Result<Vec<PhoneNumber>> {
		Ok(self
			.records
			.read()
			.values()
			.filter(|r| {
				r.status == NumberStatus::Aging && r.aging_until.is_some_and(|until| until <= now)
			})
			.cloned()
			.collect())
	}
}

//! Inventory persistence seam.
//!
//! The durable store is external to this core; the trait models exactly the
//! access pattern the concurrency design requires: single-row reads and
//! single-row writes keyed by primary key or by the (tenant, line) unique
//! pair. Each write is independently idempotent, so a crash between the two
//! row updates of an assignment self-heals on the next sweep or retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{NumberStatus, PhoneNumber};
use crate::error::{Error, Result};

/// Single-row access to the phone-number inventory.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<PhoneNumber>>;

    /// Lookup by the (tenant, line) unique pair.
    async fn get_by_line(&self, tenant: &str, line_uri: &str) -> Result<Option<PhoneNumber>>;

    /// The record currently assigned to `principal`, if any.
    async fn get_by_assignee(&self, tenant: &str, principal: &str) -> Result<Option<PhoneNumber>>;

    async fn list(&self, tenant: &str) -> Result<Vec<PhoneNumber>>;

    /// Inserts a new record; rejects a duplicate (tenant, line) pair.
    async fn insert(&self, record: PhoneNumber) -> Result<()>;

    /// Single-row update keyed by primary key.
    async fn update(&self, record: &PhoneNumber) -> Result<()>;

    /// Physical delete; only ever driven by an explicit operator action.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// All `Aging` records whose `aging_until` has passed.
    async fn list_aging_expired(&self, now: DateTime<Utc>) -> Result<Vec<PhoneNumber>>;
}

/// In-memory store used by tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, PhoneNumber>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<PhoneNumber>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn get_by_line(&self, tenant: &str, line_uri: &str) -> Result<Option<PhoneNumber>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.tenant_id == tenant && r.line_uri == line_uri)
            .cloned())
    }

    async fn get_by_assignee(&self, tenant: &str, principal: &str) -> Result<Option<PhoneNumber>> {
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

    async fn list(&self, tenant: &str) -> Result<Vec<PhoneNumber>> {
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

    async fn insert(&self, record: PhoneNumber) -> Result<()> {
        let mut records = self.records.write();
        if records
            .values()
            .any(|r| r.tenant_id == record.tenant_id && r.line_uri == record.line_uri)
        {
            return Err(Error::DuplicateLine {
                tenant: record.tenant_id.clone(),
                line: record.line_uri.clone(),
            });
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, record: &PhoneNumber) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("inventory record {}", record.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.records.write().remove(&id).is_some())
    }

    async fn list_aging_expired(&self, now: DateTime<Utc>) -> Result<Vec<PhoneNumber>> {
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

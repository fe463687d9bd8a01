//! Phone-number lifecycle engine.
//!
//! State machine over inventory records:
//!
//! ```text
//! available → reserved → aging → available      (release path)
//! available → used → aging → available          (assignment/removal path)
//! used → used                                    (re-assignment in place)
//! used → available                               (number-changed path only)
//! ```
//!
//! Every transition is a single-row update and is individually idempotent;
//! transitions are rejected fail-fast when the record is not in the required
//! source state, before any external call is attempted.
//!
//! Known gap, preserved deliberately: `reservation_period` exists in
//! configuration but the sweep does not auto-expire `Reserved` records.
//! Only the manual release path moves a reservation into `Aging`.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::inventory::{InventoryStore, NumberStatus, PhoneNumber, normalize_line_uri};

/// Assignment metadata applied when a record becomes `Used`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub display_name: String,
    pub principal: String,
    pub routing_policy: Option<String>,
}

/// Timed-transition policy over an [`InventoryStore`].
pub struct LifecycleEngine {
    store: Arc<dyn InventoryStore>,
    aging_period: ChronoDuration,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn InventoryStore>, config: &Config) -> Self {
        Self {
            store,
            aging_period: ChronoDuration::from_std(config.aging_period)
                .unwrap_or_else(|_| ChronoDuration::hours(24)),
        }
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    /// `available → reserved`. Rejected unless currently `Available`.
    pub async fn reserve(&self, tenant: &str, line_uri: &str, by: &str) -> Result<PhoneNumber> {
        let mut rec = self.require(tenant, line_uri).await?;
        if rec.status != NumberStatus::Available {
            return Err(Error::InvalidTransition {
                line: rec.line_uri,
                from: rec.status,
                to: NumberStatus::Reserved,
            });
        }

        rec.status = NumberStatus::Reserved;
        rec.reserved_by = Some(by.to_string());
        rec.reserved_at = Some(Utc::now());
        rec.touch(by);
        self.store.update(&rec).await?;
        info!(target = "linectl.lifecycle", line = %rec.line_uri, %by, "reserved");
        Ok(rec)
    }

    /// `reserved → aging`. Clears reservation metadata, stamps `aging_until`.
    pub async fn release_reservation(
        &self,
        tenant: &str,
        line_uri: &str,
        by: &str,
    ) -> Result<PhoneNumber> {
        let mut rec = self.require(tenant, line_uri).await?;
        if rec.status != NumberStatus::Reserved {
            return Err(Error::InvalidTransition {
                line: rec.line_uri,
                from: rec.status,
                to: NumberStatus::Aging,
            });
        }

        rec.status = NumberStatus::Aging;
        rec.reserved_by = None;
        rec.reserved_at = None;
        rec.aging_until = Some(Utc::now() + self.aging_period);
        rec.touch(by);
        self.store.update(&rec).await?;
        info!(target = "linectl.lifecycle", line = %rec.line_uri, "reservation released; aging");
        Ok(rec)
    }

    /// `available | reserved | used → used`, with assignment metadata.
    ///
    /// `used → used` is the re-assignment path: the active identifier stays
    /// with the same record and only the metadata changes.
    pub async fn mark_used(
        &self,
        tenant: &str,
        line_uri: &str,
        assignment: Assignment,
        by: &str,
    ) -> Result<PhoneNumber> {
        let mut rec = self.require(tenant, line_uri).await?;
        if rec.status == NumberStatus::Aging {
            return Err(Error::InvalidTransition {
                line: rec.line_uri,
                from: rec.status,
                to: NumberStatus::Used,
            });
        }

        rec.status = NumberStatus::Used;
        rec.assignee_display_name = Some(assignment.display_name);
        rec.assignee_principal = Some(assignment.principal);
        rec.routing_policy = assignment.routing_policy;
        rec.reserved_by = None;
        rec.reserved_at = None;
        rec.aging_until = None;
        rec.touch(by);
        self.store.update(&rec).await?;
        info!(
            target = "linectl.lifecycle",
            line = %rec.line_uri,
            assignee = rec.assignee_principal.as_deref().unwrap_or(""),
            "marked used"
        );
        Ok(rec)
    }

    /// `used → available` without aging.
    ///
    /// Only valid on the number-changed path of an assignment: the old
    /// identifier is known to be currently unassigned, not merely released,
    /// so the cool-off does not apply.
    pub async fn release_immediately(
        &self,
        tenant: &str,
        line_uri: &str,
        by: &str,
    ) -> Result<PhoneNumber> {
        let mut rec = self.require(tenant, line_uri).await?;
        if rec.status != NumberStatus::Used {
            return Err(Error::InvalidTransition {
                line: rec.line_uri,
                from: rec.status,
                to: NumberStatus::Available,
            });
        }

        rec.status = NumberStatus::Available;
        rec.clear_status_metadata();
        rec.touch(by);
        self.store.update(&rec).await?;
        info!(target = "linectl.lifecycle", line = %rec.line_uri, "released immediately");
        Ok(rec)
    }

    /// `used → aging`. Explicit removal of an assignment; the number is
    /// presumed reusable only after the cool-off.
    pub async fn remove_assignment(
        &self,
        tenant: &str,
        line_uri: &str,
        by: &str,
    ) -> Result<PhoneNumber> {
        let mut rec = self.require(tenant, line_uri).await?;
        if rec.status != NumberStatus::Used {
            return Err(Error::InvalidTransition {
                line: rec.line_uri,
                from: rec.status,
                to: NumberStatus::Aging,
            });
        }

        rec.status = NumberStatus::Aging;
        rec.assignee_display_name = None;
        rec.assignee_principal = None;
        rec.routing_policy = None;
        rec.aging_until = Some(Utc::now() + self.aging_period);
        rec.touch(by);
        self.store.update(&rec).await?;
        info!(target = "linectl.lifecycle", line = %rec.line_uri, "assignment removed; aging");
        Ok(rec)
    }

    /// Flips every `Aging` record past its `aging_until` to `Available`.
    ///
    /// Safe to run concurrently with itself and on a fixed interval: each
    /// record transition is an independent single-row update, and applying
    /// it to a record that already came back to `Available` is a no-op.
    pub async fn sweep(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.store.list_aging_expired(now).await?;
        let mut flipped = 0;

        for mut rec in due {
            // Re-check under the current snapshot; a concurrent sweep may
            // have already flipped this record.
            if rec.status != NumberStatus::Aging {
                continue;
            }
            rec.status = NumberStatus::Available;
            rec.clear_status_metadata();
            rec.touch("lifecycle-sweep");
            self.store.update(&rec).await?;
            flipped += 1;
            debug!(target = "linectl.lifecycle", line = %rec.line_uri, "aging expired");
        }

        if flipped > 0 {
            info!(target = "linectl.lifecycle", count = flipped, "sweep returned numbers to available");
        }
        Ok(flipped)
    }

    /// Seeds a new `Available` record (operator import/seed/sync).
    pub async fn import(&self, tenant: &str, line_uri: &str, by: &str) -> Result<PhoneNumber> {
        let rec = PhoneNumber::new(tenant, line_uri, by)?;
        self.store.insert(rec.clone()).await?;
        Ok(rec)
    }

    /// Explicit operator delete; the only physical removal path.
    pub async fn delete(&self, tenant: &str, line_uri: &str) -> Result<()> {
        let rec = self.require(tenant, line_uri).await?;
        self.store.delete(rec.id).await?;
        Ok(())
    }

    async fn require(&self, tenant: &str, line_uri: &str) -> Result<PhoneNumber> {
        let line = normalize_line_uri(line_uri)?;
        self.store
            .get_by_line(tenant, &line)
            .await?
            .ok_or_else(|| Error::NotFound(format!("number {line} for tenant {tenant}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MemoryStore;

    fn engine() -> LifecycleEngine {
        let mut config = Config::default();
        config.aging_period = std::time::Duration::from_secs(3600);
        LifecycleEngine::new(Arc::new(MemoryStore::new()), &config)
    }

    fn assignment(principal: &str) -> Assignment {
        Assignment {
            display_name: "Jordan Example".to_string(),
            principal: principal.to_string(),
            routing_policy: Some("Standard".to_string()),
        }
    }

    #[tokio::test]
    async fn reserve_release_sweep_round_trip_clears_all_metadata() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();

        let rec = engine
            .reserve("contoso", "+15551230000", "ops@example.com")
            .await
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Reserved);
        assert_eq!(rec.reserved_by.as_deref(), Some("ops@example.com"));
        assert!(rec.reserved_at.is_some());

        let rec = engine
            .release_reservation("contoso", "+15551230000", "ops@example.com")
            .await
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Aging);
        assert!(rec.reserved_by.is_none());
        assert!(rec.reserved_at.is_none());
        assert!(rec.aging_until.is_some());

        // Advance past aging_until by rewriting the stamp, then sweep.
        let mut rec = rec;
        rec.aging_until = Some(Utc::now() - ChronoDuration::minutes(1));
        engine.store().update(&rec).await.unwrap();
        assert_eq!(engine.sweep().await.unwrap(), 1);

        let rec = engine
            .store()
            .get_by_line("contoso", "+15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Available);
        assert!(rec.reserved_by.is_none());
        assert!(rec.reserved_at.is_none());
        assert!(rec.aging_until.is_none());
    }

    #[tokio::test]
    async fn reserve_requires_available() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .mark_used("contoso", "+15551230000", assignment("a@contoso.com"), "ops")
            .await
            .unwrap();

        let err = engine
            .reserve("contoso", "+15551230000", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: NumberStatus::Used, .. }));
        assert!(err.is_fail_fast());
    }

    #[tokio::test]
    async fn used_to_used_remark_updates_metadata_in_place() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .mark_used("contoso", "+15551230000", assignment("a@contoso.com"), "ops")
            .await
            .unwrap();

        let rec = engine
            .mark_used("contoso", "+15551230000", assignment("b@contoso.com"), "ops")
            .await
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Used);
        assert_eq!(rec.assignee_principal.as_deref(), Some("b@contoso.com"));
    }

    #[tokio::test]
    async fn aging_record_cannot_be_marked_used() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .mark_used("contoso", "+15551230000", assignment("a@contoso.com"), "ops")
            .await
            .unwrap();
        engine
            .remove_assignment("contoso", "+15551230000", "ops")
            .await
            .unwrap();

        let err = engine
            .mark_used("contoso", "+15551230000", assignment("b@contoso.com"), "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: NumberStatus::Aging, .. }));
    }

    #[tokio::test]
    async fn remove_assignment_ages_and_clears_assignee() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .mark_used("contoso", "+15551230000", assignment("a@contoso.com"), "ops")
            .await
            .unwrap();

        let rec = engine
            .remove_assignment("contoso", "+15551230000", "ops")
            .await
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Aging);
        assert!(rec.assignee_principal.is_none());
        assert!(rec.routing_policy.is_none());
        assert!(rec.aging_until.is_some());
    }

    #[tokio::test]
    async fn release_immediately_skips_aging() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .mark_used("contoso", "+15551230000", assignment("a@contoso.com"), "ops")
            .await
            .unwrap();

        let rec = engine
            .release_immediately("contoso", "+15551230000", "ops")
            .await
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Available);
        assert!(rec.aging_until.is_none());
        assert!(rec.assignee_principal.is_none());
    }

    #[tokio::test]
    async fn sweep_is_idempotent_per_record() {
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        engine
            .reserve("contoso", "+15551230000", "ops")
            .await
            .unwrap();
        let mut rec = engine
            .release_reservation("contoso", "+15551230000", "ops")
            .await
            .unwrap();
        rec.aging_until = Some(Utc::now() - ChronoDuration::minutes(1));
        engine.store().update(&rec).await.unwrap();

        assert_eq!(engine.sweep().await.unwrap(), 1);
        // Second pass finds nothing due; the record stays Available.
        assert_eq!(engine.sweep().await.unwrap(), 0);
        let rec = engine
            .store()
            .get_by_line("contoso", "+15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Available);
    }

    #[tokio::test]
    async fn sweep_does_not_expire_reservations() {
        // The reservation period is configuration only; the sweep must not
        // touch Reserved records no matter how old they are.
        let engine = engine();
        engine.import("contoso", "+15551230000", "seed").await.unwrap();
        let mut rec = engine
            .reserve("contoso", "+15551230000", "ops")
            .await
            .unwrap();
        rec.reserved_at = Some(Utc::now() - ChronoDuration::days(365));
        engine.store().update(&rec).await.unwrap();

        assert_eq!(engine.sweep().await.unwrap(), 0);
        let rec = engine
            .store()
            .get_by_line("contoso", "+15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Reserved);
    }
}

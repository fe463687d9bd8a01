//! Phone-number inventory records.
//!
//! One record per telephony identifier owned by a tenant. The
//! (tenant, line) pair is unique; metadata is scoped to the status that
//! owns it (assignment metadata only while `Used`, reservation metadata
//! only while `Reserved`, `aging_until` only while `Aging`).

pub mod store;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{Error, Result};

pub use store::{InventoryStore, MemoryStore};

/// Lifecycle status of an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStatus {
    /// Free for reservation or assignment.
    Available,
    /// Held by an operator ahead of an assignment.
    Reserved,
    /// Actively assigned to a user.
    Used,
    /// Released and cooling off before reuse.
    Aging,
}

/// One telephony identifier owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: Uuid,
    pub tenant_id: String,
    /// E.164-normalized line identifier, unique per tenant.
    pub line_uri: String,
    pub status: NumberStatus,

    // Assignment metadata: non-null only while status == Used.
    pub assignee_display_name: Option<String>,
    pub assignee_principal: Option<String>,
    pub routing_policy: Option<String>,

    // Reservation metadata: non-null only while status == Reserved.
    pub reserved_by: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,

    // Aging metadata: non-null only while status == Aging.
    pub aging_until: Option<DateTime<Utc>>,

    pub tags: Vec<String>,
    pub notes: Option<String>,

    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhoneNumber {
    /// Creates a fresh `Available` record with a normalized line identifier.
    pub fn new(tenant_id: impl Into<String>, line_uri: &str, created_by: impl Into<String>) -> Result<Self> {
        let now = Utc::now();
        let created_by = created_by.into();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            line_uri: normalize_line_uri(line_uri)?,
            status: NumberStatus::Available,
            assignee_display_name: None,
            assignee_principal: None,
            routing_policy: None,
            reserved_by: None,
            reserved_at: None,
            aging_until: None,
            tags: Vec::new(),
            notes: None,
            created_by: created_by.clone(),
            updated_by: created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Clears every status-scoped field. Used on the way back to `Available`.
    pub(crate) fn clear_status_metadata(&mut self) {
        self.assignee_display_name = None;
        self.assignee_principal = None;
        self.routing_policy = None;
        self.reserved_by = None;
        self.reserved_at = None;
        self.aging_until = None;
    }

    pub(crate) fn touch(&mut self, by: &str) {
        self.updated_by = by.to_string();
        self.updated_at = Utc::now();
    }
}

static LINE_URI_RE: OnceLock<Regex> = OnceLock::new();

/// Normalizes a raw line identifier to E.164 (`+` followed by 7-15 digits).
///
/// Accepts common operator input like `+1 (555) 123-0000` and `tel:+1555...`;
/// rejects anything that does not reduce to a plausible E.164 number.
pub fn normalize_line_uri(raw: &str) -> Result<String> {
    let stripped: String = raw
        .trim()
        .trim_start_matches("tel:")
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let candidate = if stripped.starts_with('+') {
        stripped
    } else {
        format!("+{stripped}")
    };

    let re = LINE_URI_RE.get_or_init(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("static regex"));
    if re.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(Error::InvalidLineUri(raw.to_string()))
    }
}

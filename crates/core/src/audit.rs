//! Audit provenance carried by every persisted aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation / modification provenance.
///
/// - `created_on` / `created_by` are written once, when the entity goes from
///   "not persisted" to "persisted".
/// - `last_modified_on` / `last_modified_by` are written on every committed
///   modification, including the creating one.
///
/// Fields are `None` until the first commit stamps them. Rows loaded from the
/// store always carry a creation pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_on: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub last_modified_on: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
}

impl AuditInfo {
    /// Provenance for rows that already exist (seed data, imports).
    pub fn created(on: DateTime<Utc>, by: impl Into<String>) -> Self {
        Self {
            created_on: Some(on),
            created_by: Some(by.into()),
            last_modified_on: None,
            last_modified_by: None,
        }
    }

    /// Stamp the creating transition: both pairs get the same values.
    pub fn stamp_created(&mut self, now: DateTime<Utc>, user_id: &str) {
        self.created_on = Some(now);
        self.created_by = Some(user_id.to_owned());
        self.stamp_modified(now, user_id);
    }

    /// Stamp a modification of an already persisted entity.
    pub fn stamp_modified(&mut self, now: DateTime<Utc>, user_id: &str) {
        self.last_modified_on = Some(now);
        self.last_modified_by = Some(user_id.to_owned());
    }

    /// Whether the entity has ever been persisted.
    pub fn is_persisted(&self) -> bool {
        self.created_on.is_some()
    }
}

/// Capability: the entity carries [`AuditInfo`] the commit pipeline stamps.
pub trait Auditable {
    fn audit(&self) -> &AuditInfo;

    fn audit_mut(&mut self) -> &mut AuditInfo;
}

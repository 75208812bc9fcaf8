use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use travel_core::{AuditInfo, Auditable, DomainResult, Entity, EntityKey, ItineraryId, Trackable};

use crate::validate::{self, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_USER_ID_LEN};

/// Aggregate root: Itinerary.
///
/// Owned by a user; stops reference it by `itinerary_id`. Raises no events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    id: ItineraryId,
    name: String,
    description: Option<String>,
    user_id: String,
    #[serde(flatten)]
    audit: AuditInfo,
}

impl Itinerary {
    pub fn new(name: &str, user_id: &str) -> DomainResult<Self> {
        Ok(Self {
            id: ItineraryId::new(),
            name: validate::required("name", name, MAX_NAME_LEN)?,
            description: None,
            user_id: validate::required("user_id", user_id, MAX_USER_ID_LEN)?,
            audit: AuditInfo::default(),
        })
    }

    pub fn with_id(mut self, id: ItineraryId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: &str) -> DomainResult<Self> {
        self.description = validate::optional("description", Some(description), MAX_DESCRIPTION_LEN)?;
        Ok(self)
    }

    /// Attach pre-existing provenance (seed data, imports).
    pub fn with_audit(mut self, audit: AuditInfo) -> Self {
        self.audit = audit;
        self
    }

    pub fn id_typed(&self) -> ItineraryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn update_details(&mut self, name: &str, description: Option<&str>) -> DomainResult<()> {
        let name = validate::required("name", name, MAX_NAME_LEN)?;
        let description = validate::optional("description", description, MAX_DESCRIPTION_LEN)?;
        self.name = name;
        self.description = description;
        Ok(())
    }
}

impl Entity for Itinerary {
    type Id = ItineraryId;

    const TYPE_NAME: &'static str = "itineraries";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Auditable for Itinerary {
    fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }
}

impl Trackable for Itinerary {
    fn key(&self) -> EntityKey {
        EntityKey::new(Self::TYPE_NAME, self.id)
    }

    fn to_row(&self) -> DomainResult<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(self)
    }
}

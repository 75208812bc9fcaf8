use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use travel_core::{
    AuditInfo, Auditable, DomainResult, Entity, EntityKey, EventQueue, EventSource, ItineraryId,
    StopId, Trackable,
};
use travel_events::{Event, raise};

use crate::validate::{self, MAX_NAME_LEN};

/// Aggregate: a stop on an itinerary.
///
/// Raises [`StopEvent`]s from its business methods; the queue is in-memory
/// only and never part of the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    id: StopId,
    itinerary_id: ItineraryId,
    name: String,
    image_uri: Option<Url>,
    suggested: Option<bool>,
    #[serde(flatten)]
    audit: AuditInfo,
    #[serde(skip)]
    events: EventQueue,
}

impl Stop {
    pub fn new(itinerary_id: ItineraryId, name: &str) -> DomainResult<Self> {
        Ok(Self {
            id: StopId::new(),
            itinerary_id,
            name: validate::required("name", name, MAX_NAME_LEN)?,
            image_uri: None,
            suggested: Some(false),
            audit: AuditInfo::default(),
            events: EventQueue::new(),
        })
    }

    pub fn with_id(mut self, id: StopId) -> Self {
        self.id = id;
        self
    }

    pub fn with_image_uri(mut self, image_uri: &str) -> DomainResult<Self> {
        self.image_uri = validate::image_uri(Some(image_uri))?;
        Ok(self)
    }

    /// Attach pre-existing provenance (seed data, imports).
    pub fn with_audit(mut self, audit: AuditInfo) -> Self {
        self.audit = audit;
        self
    }

    pub fn id_typed(&self) -> StopId {
        self.id
    }

    pub fn itinerary_id(&self) -> ItineraryId {
        self.itinerary_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_uri(&self) -> Option<&Url> {
        self.image_uri.as_ref()
    }

    pub fn suggested(&self) -> Option<bool> {
        self.suggested
    }

    /// Apply an update and raise `StopUpdated` with the new values.
    ///
    /// Validation happens before any field changes, so a rejected update
    /// leaves the stop and its event queue untouched.
    pub fn handle_update(&mut self, cmd: &UpdateStop) -> DomainResult<()> {
        let name = validate::required("name", &cmd.name, MAX_NAME_LEN)?;
        let image_uri = validate::image_uri(cmd.image_uri.as_deref())?;

        self.name = name;
        self.image_uri = image_uri;
        self.suggested = cmd.suggested;

        raise(
            &mut self.events,
            &StopEvent::Updated(StopUpdated {
                stop_id: self.id,
                itinerary_id: self.itinerary_id,
                name: self.name.clone(),
                image_uri: self.image_uri.clone(),
                suggested: self.suggested,
                occurred_at: cmd.occurred_at,
            }),
        )
    }
}

impl Entity for Stop {
    type Id = StopId;

    const TYPE_NAME: &'static str = "stops";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Auditable for Stop {
    fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }
}

impl EventSource for Stop {
    fn events(&self) -> &EventQueue {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }
}

impl Trackable for Stop {
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

    fn as_event_source(&self) -> Option<&dyn EventSource> {
        Some(self)
    }

    fn as_event_source_mut(&mut self) -> Option<&mut dyn EventSource> {
        Some(self)
    }
}

/// Command: UpdateStop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStop {
    pub name: String,
    pub image_uri: Option<String>,
    pub suggested: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StopUpdated (snapshot of the values after the update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopUpdated {
    pub stop_id: StopId,
    pub itinerary_id: ItineraryId,
    pub name: String,
    pub image_uri: Option<Url>,
    pub suggested: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopEvent {
    Updated(StopUpdated),
}

impl StopEvent {
    pub const UPDATED: &'static str = "itineraries.stop.updated";
}

impl Event for StopEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StopEvent::Updated(_) => Self::UPDATED,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StopEvent::Updated(e) => e.occurred_at,
        }
    }
}

//! Entity traits: identity plus the capability interface used by the change tracker.

use core::any::Any;

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::audit::Auditable;
use crate::domain_event::EventSource;
use crate::error::DomainResult;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Stable name of the entity type (also the store's table name).
    const TYPE_NAME: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Identity of a tracked entity, independent of its concrete type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey {
    pub entity_type: &'static str,
    pub id: Uuid,
}

impl EntityKey {
    pub fn new(entity_type: &'static str, id: impl Into<Uuid>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }
}

impl core::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A named contract an entity type may implement, queried generically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Carries audit provenance ([`Auditable`]).
    Auditable,
    /// Accumulates domain events ([`EventSource`]).
    EventSource,
}

/// Downcasting support for trait objects. Blanket-implemented for all `'static` types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An entity the change tracker can hold.
///
/// Capabilities are opt-in: the accessors default to `None`, and an entity
/// type overrides the ones it supports. Callers filter by capability and never
/// need to know the concrete type.
pub trait Trackable: AsAny + Send + core::fmt::Debug {
    fn key(&self) -> EntityKey;

    /// Column data as it is written to the store.
    fn to_row(&self) -> DomainResult<JsonValue>;

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    fn as_event_source(&self) -> Option<&dyn EventSource> {
        None
    }

    fn as_event_source_mut(&mut self) -> Option<&mut dyn EventSource> {
        None
    }

    fn implements(&self, capability: Capability) -> bool {
        match capability {
            Capability::Auditable => self.as_auditable().is_some(),
            Capability::EventSource => self.as_event_source().is_some(),
        }
    }
}

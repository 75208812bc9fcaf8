//! `travel-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the audit data shape, the domain event carrier and the
//! capability interface every tracked entity implements.

pub mod audit;
pub mod clock;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod id;

pub use audit::{AuditInfo, Auditable};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain_event::{EventCarrier, EventQueue, EventSource};
pub use entity::{AsAny, Capability, Entity, EntityKey, Trackable};
pub use error::{DomainError, DomainResult};
pub use id::{ItineraryId, StopId};

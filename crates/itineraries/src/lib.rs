//! Itineraries domain module.
//!
//! Itineraries own stops. Both are plain state-based aggregates tracked by the
//! persistence layer; `Stop` additionally raises domain events that the
//! commit pipeline publishes once its changes are durable.

pub mod itinerary;
pub mod listeners;
pub mod stop;
mod validate;

pub use itinerary::Itinerary;
pub use listeners::SuggestStopsOnStopUpdated;
pub use stop::{Stop, StopEvent, StopUpdated, UpdateStop};

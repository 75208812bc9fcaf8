//! In-process reactions to itinerary events.

use async_trait::async_trait;
use tracing::info;

use travel_core::EventCarrier;
use travel_events::{EventSubscriber, SubscriberError};

use crate::stop::StopEvent;

/// Reacts to stop updates so suggested stops for the itinerary can be refreshed.
///
/// Generating suggestions is not wired up yet; for now the listener records
/// that it ran.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuggestStopsOnStopUpdated;

#[async_trait]
impl EventSubscriber for SuggestStopsOnStopUpdated {
    fn name(&self) -> &str {
        "suggest_stops_on_stop_updated"
    }

    fn handles(&self, kind: &str) -> bool {
        kind == StopEvent::UPDATED
    }

    async fn handle(&self, event: &EventCarrier) -> Result<(), SubscriberError> {
        let stop_id = event
            .payload()
            .get("stop_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SubscriberError::new("stop updated payload is missing stop_id"))?;

        info!(
            listener = self.name(),
            domain_event = event.kind(),
            stop_id,
            "listener to domain event triggered"
        );
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use travel_core::{DomainResult, EventCarrier, EventQueue};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **named** by a stable type identifier that subscribers route on
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "itineraries.stop.updated").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Snapshot a typed event into a carrier and append it to `queue`.
///
/// The payload is serialized now, so later changes to the entity never leak
/// into an already raised event.
pub fn raise<E>(queue: &mut EventQueue, event: &E) -> DomainResult<()>
where
    E: Event + Serialize,
{
    let payload = serde_json::to_value(event)?;
    queue.push(EventCarrier::new(event.event_type(), payload, event.occurred_at()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize)]
    struct Renamed {
        name: String,
        occurred_at: DateTime<Utc>,
    }

    impl Event for Renamed {
        fn event_type(&self) -> &'static str {
            "test.renamed"
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.occurred_at
        }
    }

    #[test]
    fn raise_captures_kind_and_payload_snapshot() {
        let mut queue = EventQueue::new();
        let mut event = Renamed {
            name: "Louvre".to_string(),
            occurred_at: Utc::now(),
        };
        raise(&mut queue, &event).unwrap();
        event.name = "changed afterwards".to_string();

        let carrier = &queue.pending()[0];
        assert_eq!(carrier.kind(), "test.renamed");
        assert_eq!(carrier.payload()["name"], json!("Louvre"));
        assert_ne!(carrier.payload()["name"], json!(event.name));
        assert!(!carrier.is_published());
    }
}

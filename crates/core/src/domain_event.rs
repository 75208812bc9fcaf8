//! Domain event carriers and the per-entity queue that holds them.
//!
//! Entities raise events as a side effect of business methods. The carriers
//! stay in the entity's own [`EventQueue`] until the commit pipeline has
//! durably flushed the change they describe and handed them to the publisher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// "Something happened to an entity", queued for post-commit notification.
///
/// Everything except the published flag is fixed at raise time; the payload is
/// a snapshot and is never re-read from the entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCarrier {
    id: Uuid,
    kind: String,
    payload: JsonValue,
    occurred_at: DateTime<Utc>,
    published: bool,
}

impl EventCarrier {
    pub fn new(kind: impl Into<String>, payload: JsonValue, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: kind.into(),
            payload,
            occurred_at,
            published: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn is_published(&self) -> bool {
        self.published
    }
}

/// Append-only, insertion-ordered queue of carriers owned by one entity.
///
/// Carriers are published in insertion order, so the published ones always
/// form a prefix and [`EventQueue::pending`] is the remaining suffix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQueue {
    carriers: Vec<EventCarrier>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, carrier: EventCarrier) {
        self.carriers.push(carrier);
    }

    /// Carriers not yet published, in the order they were raised.
    pub fn pending(&self) -> &[EventCarrier] {
        let published = self.carriers.partition_point(EventCarrier::is_published);
        &self.carriers[published..]
    }

    /// Flip the published flag of the oldest pending carrier.
    ///
    /// Returns `false` (and changes nothing) unless `id` names that carrier,
    /// which keeps both the prefix ordering and the false -> true-once rule.
    pub fn mark_published(&mut self, id: Uuid) -> bool {
        let head = self.carriers.partition_point(EventCarrier::is_published);
        match self.carriers.get_mut(head) {
            Some(carrier) if carrier.id == id => {
                carrier.published = true;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventCarrier> {
        self.carriers.iter()
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }
}

/// Capability: the entity accumulates domain events in an owned queue.
///
/// The entity only appends; draining and marking are the commit pipeline's job.
pub trait EventSource {
    fn events(&self) -> &EventQueue;

    fn events_mut(&mut self) -> &mut EventQueue;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn carrier(n: u32) -> EventCarrier {
        EventCarrier::new("test.happened", json!({ "n": n }), Utc::now())
    }

    #[test]
    fn new_carrier_is_unpublished() {
        assert!(!carrier(1).is_published());
    }

    #[test]
    fn pending_preserves_insertion_order() {
        let mut queue = EventQueue::new();
        queue.push(carrier(1));
        queue.push(carrier(2));

        let ns: Vec<_> = queue.pending().iter().map(|c| c.payload()["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);
    }

    #[test]
    fn marking_publishes_exactly_once() {
        let mut queue = EventQueue::new();
        let first = carrier(1);
        let id = first.id();
        queue.push(first);

        assert!(queue.mark_published(id));
        assert!(!queue.mark_published(id));
        assert!(queue.pending().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn marking_out_of_order_is_rejected() {
        let mut queue = EventQueue::new();
        queue.push(carrier(1));
        let second = carrier(2);
        let second_id = second.id();
        queue.push(second);

        assert!(!queue.mark_published(second_id));
        assert_eq!(queue.pending().len(), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: after marking the first `k` of `n` carriers, exactly
            /// the last `n - k` are pending and published ones form a prefix.
            #[test]
            fn published_carriers_form_a_prefix(n in 0usize..20, k in 0usize..20) {
                let k = k.min(n);
                let mut queue = EventQueue::new();
                let mut ids = Vec::new();
                for i in 0..n {
                    let c = carrier(i as u32);
                    ids.push(c.id());
                    queue.push(c);
                }
                for id in ids.iter().take(k) {
                    prop_assert!(queue.mark_published(*id));
                }

                prop_assert_eq!(queue.pending().len(), n - k);
                let flags: Vec<bool> = queue.iter().map(EventCarrier::is_published).collect();
                prop_assert!(flags.windows(2).all(|w| w[0] || !w[1]));
            }
        }
    }
}

//! In-process publisher fanning carriers out to registered subscribers.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use travel_core::EventCarrier;

use crate::publisher::{EventPublisher, PublishFailure};
use crate::subscriber::EventSubscriber;

/// In-memory publisher.
///
/// - Subscribers run one at a time, in registration order
/// - Fail-fast: the first failing subscriber ends the publish with an error
/// - No buffering: `publish` returns once every interested subscriber is done
#[derive(Default)]
pub struct SubscriberPublisher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl SubscriberPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> Result<(), PublishFailure> {
        let mut subs = self.subscribers.write().map_err(|_| PublishFailure::Poisoned)?;
        subs.push(subscriber);
        Ok(())
    }

    pub fn with_subscriber(self, subscriber: Arc<dyn EventSubscriber>) -> Result<Self, PublishFailure> {
        self.subscribe(subscriber)?;
        Ok(self)
    }

    fn interested(&self, kind: &str) -> Result<Vec<Arc<dyn EventSubscriber>>, PublishFailure> {
        // Snapshot so the lock is never held across an await.
        let subs = self.subscribers.read().map_err(|_| PublishFailure::Poisoned)?;
        Ok(subs.iter().filter(|s| s.handles(kind)).cloned().collect())
    }
}

impl core::fmt::Debug for SubscriberPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.subscribers.read().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("SubscriberPublisher")
            .field("subscribers", &count)
            .finish()
    }
}

#[async_trait]
impl EventPublisher for SubscriberPublisher {
    async fn publish(&self, event: &EventCarrier) -> Result<(), PublishFailure> {
        for subscriber in self.interested(event.kind())? {
            debug!(
                subscriber = subscriber.name(),
                kind = event.kind(),
                event_id = %event.id(),
                "dispatching domain event"
            );
            if let Err(err) = subscriber.handle(event).await {
                warn!(
                    subscriber = subscriber.name(),
                    kind = event.kind(),
                    event_id = %event.id(),
                    error = %err,
                    "subscriber failed"
                );
                return Err(PublishFailure::Subscriber {
                    subscriber: subscriber.name().to_string(),
                    message: err.to_string(),
                });
            }
        }
        Ok(())
    }
}

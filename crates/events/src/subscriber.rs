use async_trait::async_trait;
use thiserror::Error;

use travel_core::EventCarrier;

/// Failure reported by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SubscriberError(String);

impl SubscriberError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Reacts to published domain events (notification handler abstraction).
///
/// Subscribers run in-process, after the data change is durable. They must not
/// assume exactly-once delivery: a caller retrying after a partial publish can
/// hand them carriers that were still unpublished.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Whether this subscriber wants carriers of `kind`.
    fn handles(&self, kind: &str) -> bool;

    async fn handle(&self, event: &EventCarrier) -> Result<(), SubscriberError>;
}

//! Event publishing boundary.
//!
//! The commit pipeline hands each carrier to an [`EventPublisher`] only after
//! the change it describes has been flushed, and awaits the result before
//! marking the carrier published.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use travel_core::EventCarrier;

/// Why a carrier did not reach all of its subscribers.
#[derive(Debug, Error)]
pub enum PublishFailure {
    /// A subscriber raised an error while handling the event.
    #[error("subscriber '{subscriber}' failed: {message}")]
    Subscriber { subscriber: String, message: String },

    /// Publish failed due to internal lock poisoning.
    #[error("subscriber registry lock poisoned")]
    Poisoned,
}

/// Dispatches a carrier to zero or more subscribers and awaits their completion.
///
/// `Ok(())` means every subscriber registered for the carrier's kind completed
/// without error. Implementations decide whether to stop at the first failing
/// subscriber or run them all; either way a failure is reported as `Err`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EventCarrier) -> Result<(), PublishFailure>;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(&self, event: &EventCarrier) -> Result<(), PublishFailure> {
        (**self).publish(event).await
    }
}

//! Domain events: typed events, the publisher boundary and in-process fan-out.

pub mod event;
pub mod in_memory_publisher;
pub mod publisher;
pub mod subscriber;

pub use event::{Event, raise};
pub use in_memory_publisher::SubscriberPublisher;
pub use publisher::{EventPublisher, PublishFailure};
pub use subscriber::{EventSubscriber, SubscriberError};

//! Infrastructure layer: change tracking, the commit pipeline, storage,
//! config and seed data.

pub mod change_tracker;
pub mod config;
pub mod handlers;
pub mod seed;
pub mod store;
pub mod unit_of_work;

mod integration_tests;

pub use change_tracker::{ChangeTracker, EntityState, InvalidStateError};
pub use config::AppConfig;
pub use store::{Change, InMemoryStore, Store, StoreError};
pub use unit_of_work::{CommitError, CommitPipeline, PublishReport};

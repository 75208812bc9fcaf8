//! Unit-of-work commit pipeline.
//!
//! Persists every pending change in a [`ChangeTracker`] as one atomic store
//! call, stamping audit fields on the way in and notifying event subscribers
//! on the way out.
//!
//! ## Commit Flow
//!
//! ```text
//! commit(tracker, user, cancel)
//!   ↓
//! 1. Validate tracked state (no I/O yet)
//!   ↓
//! 2. Stamp audit fields (one `now`, one user id)
//!   ↓
//! 3. Collect unpublished event carriers (registration order, then raise order)
//!   ↓
//! 4. Cancelled? -> restore audit fields, return `Cancelled`
//!   ↓
//! 5. Flush all row changes atomically (never interrupted once started)
//!   ↓
//! 6. Publish carriers one by one, marking each published on its entity
//!   ↓
//! 7. Accept changes in the tracker, return rows affected
//! ```
//!
//! Delivery is at most once per carrier per successful publish: a carrier is
//! marked only after the publisher returned `Ok`, and a marked carrier is
//! never collected again. Once the flush succeeded the data is durable; a
//! later publish failure is reported with a [`PublishReport`] but never rolls
//! anything back.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use travel_auth::CurrentUser;
use travel_core::{Clock, EntityKey, EventCarrier, SystemClock, Trackable};
use travel_events::{EventPublisher, PublishFailure};

use crate::change_tracker::{ChangeTracker, InvalidStateError};
use crate::store::{Store, StoreError};

/// A carrier the publish phase did not deliver, with the entity that raised it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnpublishedEvent {
    pub entity: EntityKey,
    pub carrier: EventCarrier,
}

impl UnpublishedEvent {
    pub fn id(&self) -> Uuid {
        self.carrier.id()
    }
}

/// Outcome of the publish phase of a commit whose flush already succeeded.
///
/// Undelivered carriers are carried in full: an entity deleted by the commit
/// is detached from the tracker, so this report is the only place its
/// remaining events can be republished from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReport {
    /// Rows written by the flush; these are durable.
    pub rows_affected: u64,
    /// Carriers delivered and marked published, in order.
    pub published: Vec<Uuid>,
    /// The carrier whose publish failed, if the phase stopped on a failure.
    pub failed: Option<UnpublishedEvent>,
    /// Carriers never handed to the publisher.
    pub not_attempted: Vec<UnpublishedEvent>,
}

impl PublishReport {
    /// Every undelivered carrier in publish order: the failed one, then the
    /// ones never attempted.
    pub fn unpublished(&self) -> impl Iterator<Item = &UnpublishedEvent> {
        self.failed.iter().chain(self.not_attempted.iter())
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row(s) saved, {} event(s) published, {} not attempted",
            self.rows_affected,
            self.published.len(),
            self.not_attempted.len()
        )
    }
}

/// Commit failure.
///
/// Only `Publish` and `PublishCancelled` happen after the flush; for those the
/// data change is durable and [`CommitError::rows_affected`] returns the count.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error("commit cancelled before any change was written")]
    Cancelled,

    #[error("flush failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("changes saved but publishing failed ({report}): {source}")]
    Publish {
        report: PublishReport,
        #[source]
        source: PublishFailure,
    },

    #[error("changes saved but publishing was cancelled ({report})")]
    PublishCancelled { report: PublishReport },
}

impl CommitError {
    /// Rows durably written, if the failure happened after the flush.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            CommitError::Publish { report, .. } | CommitError::PublishCancelled { report } => {
                Some(report.rows_affected)
            }
            CommitError::InvalidState(_) | CommitError::Cancelled | CommitError::Persistence(_) => {
                None
            }
        }
    }

    pub fn report(&self) -> Option<&PublishReport> {
        match self {
            CommitError::Publish { report, .. } | CommitError::PublishCancelled { report } => {
                Some(report)
            }
            _ => None,
        }
    }
}

/// Commits change trackers against a store and an event publisher.
///
/// Holds no per-request state; one pipeline serves any number of trackers.
#[derive(Debug)]
pub struct CommitPipeline<S, P, C = SystemClock> {
    store: S,
    publisher: P,
    clock: C,
}

impl<S, P> CommitPipeline<S, P>
where
    S: Store,
    P: EventPublisher,
{
    pub fn new(store: S, publisher: P) -> Self {
        Self {
            store,
            publisher,
            clock: SystemClock,
        }
    }
}

impl<S, P, C> CommitPipeline<S, P, C>
where
    S: Store,
    P: EventPublisher,
    C: Clock,
{
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CommitPipeline<S, P, C2> {
        CommitPipeline {
            store: self.store,
            publisher: self.publisher,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identity-map load.
    ///
    /// Returns the key of the tracked instance when `key` is already tracked
    /// as a `T`; otherwise loads the row, deserializes it and attaches it as
    /// `Unchanged`. `None` when neither the tracker nor the store has it.
    pub async fn find<T>(
        &self,
        tracker: &mut ChangeTracker,
        key: EntityKey,
    ) -> Result<Option<EntityKey>, CommitError>
    where
        T: Trackable + DeserializeOwned,
    {
        if tracker.contains(&key) {
            return Ok(tracker.get::<T>(&key).map(|_| key));
        }

        let Some(row) = self.store.find(&key).await? else {
            return Ok(None);
        };
        let entity: T = serde_json::from_value(row)
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))?;
        if entity.key() != key {
            return Err(StoreError::Serialization(format!(
                "row stored under {key} decodes as {}",
                entity.key()
            ))
            .into());
        }

        Ok(Some(tracker.attach(entity)?))
    }

    /// Persist all pending changes, then publish the collected events.
    ///
    /// Returns the number of rows the store reports as affected.
    #[instrument(skip_all, fields(tracked = tracker.len()), err)]
    pub async fn commit(
        &self,
        tracker: &mut ChangeTracker,
        user: &dyn CurrentUser,
        cancel: &CancellationToken,
    ) -> Result<u64, CommitError> {
        tracker.validate()?;

        let user_id = user.user_id();
        let snapshot = tracker.stamp_audit(self.clock.now(), &user_id);
        let carriers = tracker.pending_events();

        let changes = match tracker.pending_changes() {
            Ok(changes) => changes,
            Err(err) => {
                tracker.restore_audit(snapshot);
                return Err(StoreError::Serialization(err.to_string()).into());
            }
        };

        if cancel.is_cancelled() {
            tracker.restore_audit(snapshot);
            warn!("commit cancelled before flush");
            return Err(CommitError::Cancelled);
        }

        let change_count = changes.len();
        let rows_affected = match self.store.flush(changes).await {
            Ok(rows) => rows,
            Err(err) => {
                tracker.restore_audit(snapshot);
                warn!(error = %err, change_count, "flush failed; audit fields restored");
                return Err(CommitError::Persistence(err));
            }
        };

        let outcome = self
            .publish_collected(tracker, &carriers, rows_affected, cancel)
            .await;
        tracker.accept_all_changes();
        outcome?;

        info!(
            user_id = %user_id,
            rows_affected,
            events = carriers.len(),
            "unit of work committed"
        );
        Ok(rows_affected)
    }

    async fn publish_collected(
        &self,
        tracker: &mut ChangeTracker,
        carriers: &[(EntityKey, EventCarrier)],
        rows_affected: u64,
        cancel: &CancellationToken,
    ) -> Result<(), CommitError> {
        let mut published = Vec::with_capacity(carriers.len());

        for (i, (key, carrier)) in carriers.iter().enumerate() {
            if cancel.is_cancelled() {
                let report = PublishReport {
                    rows_affected,
                    published,
                    failed: None,
                    not_attempted: unpublished(&carriers[i..]),
                };
                warn!(%report, "publishing cancelled");
                return Err(CommitError::PublishCancelled { report });
            }

            if let Err(source) = self.publisher.publish(carrier).await {
                let report = PublishReport {
                    rows_affected,
                    published,
                    failed: Some(UnpublishedEvent {
                        entity: *key,
                        carrier: carrier.clone(),
                    }),
                    not_attempted: unpublished(&carriers[i + 1..]),
                };
                warn!(event_id = %carrier.id(), error = %source, %report, "publishing failed");
                return Err(CommitError::Publish { report, source });
            }

            if !tracker.mark_published(key, carrier.id()) {
                warn!(entity = %key, event_id = %carrier.id(), "published carrier could not be marked");
            }
            debug!(entity = %key, event_id = %carrier.id(), kind = carrier.kind(), "event published");
            published.push(carrier.id());
        }

        Ok(())
    }
}

fn unpublished(carriers: &[(EntityKey, EventCarrier)]) -> Vec<UnpublishedEvent> {
    carriers
        .iter()
        .map(|(entity, carrier)| UnpublishedEvent {
            entity: *entity,
            carrier: carrier.clone(),
        })
        .collect()
}
